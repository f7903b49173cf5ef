// [libs/infra/db/src/repositories/idempotency.rs]
/*!
 * =================================================================
 * APARATO: IDEMPOTENCY LEDGER REPOSITORY (V2.3 - TTL FIRST)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: RESPUESTAS MEMORIZADAS POR CLAVE DE CLIENTE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SCOPED KEY: La clave viaja como (tenant, endpoint, client_key);
 *    el mismo client_key en endpoints distintos no colisiona.
 * 2. TTL FIRST: La poda elimina primero por edad; la cota de entradas
 *    (LRU por inserción) solo actúa sobre lo que sobrevive.
 * 3. BYTE PARITY: El cuerpo memorizado se devuelve byte-idéntico para
 *    garantizar la ley de replay del contrato.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::format_timestamp;
use crate::DbClient;
use chrono::{DateTime, Utc};
use libsql::params;
use tracing::{debug, info, instrument};

/// Respuesta memorizada recuperada del Ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub status: u16,
    pub body: String,
}

/// Balance de una pasada de poda.
#[derive(Debug, Default, Clone, Copy)]
pub struct PruneReport {
    pub expired_removed: u64,
    pub capacity_removed: u64,
}

pub struct IdempotencyRepository {
    database_client: DbClient,
}

impl IdempotencyRepository {
    pub fn new(client: DbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Recupera la respuesta memorizada vigente para la clave, si existe.
     * Entradas expiradas se tratan como ausentes aunque la poda aún no
     * las haya retirado físicamente.
     */
    pub async fn fetch(
        &self,
        tenant_id: &str,
        endpoint: &str,
        client_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredResponse>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT response_status, response_body FROM idempotency_records
                 WHERE tenant_id = ?1 AND endpoint = ?2 AND client_key = ?3 AND expires_at > ?4",
                params![tenant_id, endpoint, client_key, format_timestamp(now)],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let status: i64 = row.get(0)?;
                Ok(Some(StoredResponse {
                    status: status.clamp(100, 599) as u16,
                    body: row.get(1)?,
                }))
            }
            None => Ok(None),
        }
    }

    /**
     * Memoriza la respuesta de la petición primaria con su horizonte TTL.
     */
    #[instrument(skip(self, response_body))]
    pub async fn store(
        &self,
        tenant_id: &str,
        endpoint: &str,
        client_key: &str,
        response_status: u16,
        response_body: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT OR REPLACE INTO idempotency_records
                     (tenant_id, endpoint, client_key, response_status, response_body, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    tenant_id,
                    endpoint,
                    client_key,
                    response_status as i64,
                    response_body,
                    format_timestamp(Utc::now()),
                    format_timestamp(expires_at),
                ],
            )
            .await?;

        debug!("🔁 [IDEMPOTENCY]: Response sealed for key {}:{}:{}.", tenant_id, endpoint, client_key);
        Ok(())
    }

    /**
     * Poda del Ledger: TTL primero, cota de entradas después.
     * La cota desaloja por orden de inserción (LRU de creación).
     */
    #[instrument(skip(self))]
    pub async fn prune(
        &self,
        now: DateTime<Utc>,
        max_entries: u64,
    ) -> Result<PruneReport, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut prune_report = PruneReport::default();

        // 1. EDAD: retira todo lo expirado.
        prune_report.expired_removed = connection
            .execute(
                "DELETE FROM idempotency_records WHERE expires_at <= ?1",
                params![format_timestamp(now)],
            )
            .await?;

        // 2. COTA: si lo vigente aún supera la capacidad, desaloja lo más viejo.
        let mut rows = connection
            .query("SELECT COUNT(*) FROM idempotency_records", ())
            .await?;
        let surviving_entries: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };

        if surviving_entries as u64 > max_entries {
            let overflow_count = surviving_entries as u64 - max_entries;
            prune_report.capacity_removed = connection
                .execute(
                    "DELETE FROM idempotency_records WHERE rowid IN (
                         SELECT rowid FROM idempotency_records
                         ORDER BY created_at ASC LIMIT ?1
                     )",
                    params![overflow_count as i64],
                )
                .await?;
        }

        if prune_report.expired_removed > 0 || prune_report.capacity_removed > 0 {
            info!(
                "💀 [IDEMPOTENCY_PRUNE]: Evicted {} expired + {} over-capacity entries.",
                prune_report.expired_removed, prune_report.capacity_removed
            );
        }
        Ok(prune_report)
    }
}
