// [libs/infra/db/src/repositories/dlq.rs]
/*!
 * =================================================================
 * APARATO: DEAD-LETTER REPOSITORY (V3.0 - AT-LEAST-ONCE VAULT)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CUSTODIA DE LOTES CON ENTREGA FALLIDA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. RETENTION HORIZON: Todo lote es recuperable hasta
 *    first_attempt + retención; la compactación purga lo posterior.
 * 2. REPLAY CADENCE: La elegibilidad viaja en 'next_eligible_at'; el
 *    daemon de replay consulta por ventana, jamás a ciegas.
 * 3. SINK ISOLATION: El fallo de un destino nunca toca los lotes del otro.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::{format_timestamp, parse_timestamp};
use crate::DbClient;
use chrono::{DateTime, Duration, Utc};
use libsql::{params, Row};
use panoptes_domain_models::{DlqEntry, SinkTarget};
use tracing::{info, instrument, warn};

pub struct DlqRepository {
    database_client: DbClient,
}

impl DlqRepository {
    pub fn new(client: DbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Deposita un lote tras su fallo de entrega definitivo.
     */
    #[instrument(skip(self, entry))]
    pub async fn append(&self, entry: &DlqEntry) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        let payload_json = serde_json::to_string(&entry.payload)
            .map_err(|fault| DbError::MappingError(format!("DLQ_SERIALIZATION_FAULT: {}", fault)))?;

        connection
            .execute(
                "INSERT OR REPLACE INTO dlq_batches
                     (id, destination, payload_json, first_attempt_at, last_attempt_at,
                      attempts, next_eligible_at, last_error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.id.clone(),
                    entry.destination.label(),
                    payload_json,
                    format_timestamp(entry.first_attempt_at),
                    format_timestamp(entry.last_attempt_at),
                    entry.attempts as i64,
                    format_timestamp(entry.next_eligible_at),
                    entry.last_error.clone(),
                ],
            )
            .await?;

        warn!(
            "📮 [DLQ_DEPOSIT]: Batch {} parked for {} after {} attempts.",
            entry.id,
            entry.destination.label(),
            entry.attempts
        );
        Ok(())
    }

    /**
     * Lotes elegibles para redelivery en este ciclo de replay.
     */
    pub async fn fetch_eligible(
        &self,
        now: DateTime<Utc>,
        batch_limit: i64,
    ) -> Result<Vec<DlqEntry>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT id, destination, payload_json, first_attempt_at, last_attempt_at,
                        attempts, next_eligible_at, last_error
                 FROM dlq_batches
                 WHERE next_eligible_at <= ?1
                 ORDER BY next_eligible_at ASC
                 LIMIT ?2",
                params![format_timestamp(now), batch_limit],
            )
            .await?;

        let mut eligible_entries = Vec::new();
        while let Some(row) = rows.next().await? {
            eligible_entries.push(map_dlq_row(&row)?);
        }
        Ok(eligible_entries)
    }

    /**
     * Sella un reintento fallido y reprograma la siguiente elegibilidad.
     */
    pub async fn record_failed_attempt(
        &self,
        entry_id: &str,
        attempted_at: DateTime<Utc>,
        next_eligible_at: DateTime<Utc>,
        failure_detail: &str,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE dlq_batches
                 SET attempts = attempts + 1,
                     last_attempt_at = ?2,
                     next_eligible_at = ?3,
                     last_error = ?4
                 WHERE id = ?1",
                params![
                    entry_id,
                    format_timestamp(attempted_at),
                    format_timestamp(next_eligible_at),
                    failure_detail,
                ],
            )
            .await?;
        Ok(())
    }

    /// Retira un lote entregado con éxito durante el replay.
    #[instrument(skip(self))]
    pub async fn remove(&self, entry_id: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let affected_rows = connection
            .execute("DELETE FROM dlq_batches WHERE id = ?1", params![entry_id])
            .await?;

        if affected_rows == 0 {
            return Err(DbError::DlqEntryNotFound);
        }
        info!("✅ [DLQ_RELEASE]: Batch {} redelivered and released.", entry_id);
        Ok(())
    }

    /**
     * Compactación por horizonte: purga lotes cuyo primer intento quedó
     * más allá de la retención configurada.
     */
    #[instrument(skip(self))]
    pub async fn purge_expired(
        &self,
        now: DateTime<Utc>,
        retention_seconds: i64,
    ) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let retention_horizon = now - Duration::seconds(retention_seconds);

        let purged_count = connection
            .execute(
                "DELETE FROM dlq_batches WHERE first_attempt_at <= ?1",
                params![format_timestamp(retention_horizon)],
            )
            .await?;

        if purged_count > 0 {
            warn!("💀 [DLQ_COMPACTION]: {} batches crossed the retention horizon.", purged_count);
        }
        Ok(purged_count)
    }

    pub async fn count(&self) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection.query("SELECT COUNT(*) FROM dlq_batches", ()).await?;

        match rows.next().await? {
            Some(row) => {
                let count: i64 = row.get(0)?;
                Ok(count.max(0) as u64)
            }
            None => Ok(0),
        }
    }
}

// --- PROYECCIÓN FILA -> DOMINIO ---

fn map_dlq_row(row: &Row) -> Result<DlqEntry, DbError> {
    let destination_raw: String = row.get(1)?;
    let payload_json: String = row.get(2)?;
    let first_attempt_raw: String = row.get(3)?;
    let last_attempt_raw: String = row.get(4)?;
    let next_eligible_raw: String = row.get(6)?;

    let payload: serde_json::Value = serde_json::from_str(&payload_json)
        .map_err(|fault| DbError::MappingError(format!("DLQ_DECODE_FAULT: {}", fault)))?;

    Ok(DlqEntry {
        id: row.get(0)?,
        destination: if destination_raw == "elastic" { SinkTarget::Elastic } else { SinkTarget::Splunk },
        payload,
        first_attempt_at: parse_timestamp(&first_attempt_raw)
            .ok_or_else(|| DbError::MappingError("DLQ_FIRST_ATTEMPT_UNPARSEABLE".into()))?,
        last_attempt_at: parse_timestamp(&last_attempt_raw)
            .ok_or_else(|| DbError::MappingError("DLQ_LAST_ATTEMPT_UNPARSEABLE".into()))?,
        attempts: row.get::<i64>(5)?.max(0) as u32,
        next_eligible_at: parse_timestamp(&next_eligible_raw)
            .ok_or_else(|| DbError::MappingError("DLQ_ELIGIBILITY_UNPARSEABLE".into()))?,
        last_error: row.get(7)?,
    })
}
