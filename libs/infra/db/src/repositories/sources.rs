// [libs/infra/db/src/repositories/sources.rs]
/*!
 * =================================================================
 * APARATO: SOURCE REGISTRY REPOSITORY (V3.1 - ADMISSION AUTHORITY)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA DEL REGISTRO DE FUENTES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CACHE FEEDER: El directorio en RAM del gateway se hidrata desde
 *    este repositorio al arranque y tras cada mutación administrativa.
 * 2. WRITE-BEHIND: 'touch_last_seen' recibe ráfagas diferidas del
 *    flusher para proteger el Ledger de escrituras por petición.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::{format_timestamp, parse_timestamp};
use crate::DbClient;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use panoptes_domain_models::{ObservedOrigin, Source, SourceKind, SourceStatus};
use tracing::{info, instrument};

pub struct SourceRepository {
    database_client: DbClient,
}

impl SourceRepository {
    pub fn new(client: DbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Inserta o actualiza una fuente completa (mutación administrativa).
     */
    #[instrument(skip(self, source))]
    pub async fn upsert_source(&self, source: &Source) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        let allowed_ips_json = serde_json::to_string(&source.allowed_ips)
            .map_err(|fault| DbError::MappingError(format!("ALLOWLIST_SERIALIZATION_FAULT: {}", fault)))?;

        let sql_statement = "
            INSERT INTO sources (
                id, tenant_id, display_name, declared_type, observed_origin,
                collector_label, status, allowed_ips, max_eps, block_on_exceed,
                last_seen, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                display_name = excluded.display_name,
                declared_type = excluded.declared_type,
                observed_origin = excluded.observed_origin,
                collector_label = excluded.collector_label,
                status = excluded.status,
                allowed_ips = excluded.allowed_ips,
                max_eps = excluded.max_eps,
                block_on_exceed = excluded.block_on_exceed,
                updated_at = CURRENT_TIMESTAMP
        ";

        // Los campos opcionales viajan como cadena vacía; el mapeo de
        // lectura restituye el None.
        connection
            .execute(sql_statement, params![
                source.id.clone(),
                source.tenant_id.clone(),
                source.display_name.clone(),
                kind_label(source.declared_type),
                origin_label(source.observed_origin),
                source.collector_label.clone().unwrap_or_default(),
                status_label(source.status),
                allowed_ips_json,
                source.max_eps as i64,
                source.block_on_exceed as i64,
                source.last_seen.map(format_timestamp).unwrap_or_default(),
            ])
            .await?;

        info!("🗂️ [SOURCE_REGISTRY]: Source {} crystallized.", source.id);
        Ok(())
    }

    /// Hidratación completa del directorio de admisión.
    pub async fn fetch_all(&self) -> Result<Vec<Source>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT id, tenant_id, display_name, declared_type, observed_origin,
                        COALESCE(collector_label, ''), status, allowed_ips, max_eps,
                        block_on_exceed, COALESCE(last_seen, '')
                 FROM sources ORDER BY id",
                (),
            )
            .await?;

        let mut hydrated_sources = Vec::new();
        while let Some(row) = rows.next().await? {
            hydrated_sources.push(map_source_row(&row)?);
        }
        Ok(hydrated_sources)
    }

    pub async fn fetch_by_id(&self, source_id: &str) -> Result<Source, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT id, tenant_id, display_name, declared_type, observed_origin,
                        COALESCE(collector_label, ''), status, allowed_ips, max_eps,
                        block_on_exceed, COALESCE(last_seen, '')
                 FROM sources WHERE id = ?1",
                params![source_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => map_source_row(&row),
            None => Err(DbError::SourceNotFound),
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_source(&self, source_id: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let affected_rows = connection
            .execute("DELETE FROM sources WHERE id = ?1", params![source_id])
            .await?;

        if affected_rows == 0 {
            return Err(DbError::SourceNotFound);
        }
        Ok(())
    }

    /**
     * Sella la última observación de tráfico de una fuente (write-behind).
     */
    pub async fn touch_last_seen(
        &self,
        source_id: &str,
        observed_at: DateTime<Utc>,
        observed_origin: ObservedOrigin,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE sources SET last_seen = ?2, observed_origin = ?3 WHERE id = ?1",
                params![source_id, format_timestamp(observed_at), origin_label(observed_origin)],
            )
            .await?;
        Ok(())
    }
}

// --- PROYECCIÓN FILA -> DOMINIO ---

fn map_source_row(row: &Row) -> Result<Source, DbError> {
    let allowed_ips_json: String = row.get(7)?;
    let allowed_ips: Vec<String> = serde_json::from_str(&allowed_ips_json)
        .map_err(|fault| DbError::MappingError(format!("ALLOWLIST_DECODE_FAULT: {}", fault)))?;

    let declared_type_raw: String = row.get(3)?;
    let observed_origin_raw: String = row.get(4)?;
    let collector_label_raw: String = row.get(5)?;
    let status_raw: String = row.get(6)?;
    let last_seen_raw: String = row.get(10)?;

    Ok(Source {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        display_name: row.get(2)?,
        declared_type: parse_kind(&declared_type_raw),
        observed_origin: parse_origin(&observed_origin_raw),
        collector_label: (!collector_label_raw.is_empty()).then_some(collector_label_raw),
        status: parse_status(&status_raw),
        allowed_ips,
        max_eps: row.get::<i64>(8)?.max(0) as u32,
        block_on_exceed: row.get::<i64>(9)? != 0,
        last_seen: parse_timestamp(&last_seen_raw),
    })
}

fn kind_label(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Http => "http",
        SourceKind::Udp => "udp",
    }
}

fn parse_kind(raw: &str) -> SourceKind {
    match raw {
        "udp" => SourceKind::Udp,
        _ => SourceKind::Http,
    }
}

fn origin_label(origin: ObservedOrigin) -> &'static str {
    match origin {
        ObservedOrigin::Http => "http",
        ObservedOrigin::Udp => "udp",
        ObservedOrigin::Unknown => "unknown",
    }
}

fn parse_origin(raw: &str) -> ObservedOrigin {
    match raw {
        "http" => ObservedOrigin::Http,
        "udp" => ObservedOrigin::Udp,
        _ => ObservedOrigin::Unknown,
    }
}

fn status_label(status: SourceStatus) -> &'static str {
    match status {
        SourceStatus::Enabled => "enabled",
        SourceStatus::Disabled => "disabled",
    }
}

fn parse_status(raw: &str) -> SourceStatus {
    match raw {
        "disabled" => SourceStatus::Disabled,
        _ => SourceStatus::Enabled,
    }
}
