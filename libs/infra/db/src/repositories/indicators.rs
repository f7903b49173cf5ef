// [libs/infra/db/src/repositories/indicators.rs]
/*!
 * =================================================================
 * APARATO: THREAT FEED REPOSITORY (V2.2 - FILE SEED + API MUTATION)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA DEL FEED DE INDICADORES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SEED DISCIPLINE: El fichero THREATLIST_CSV siembra el feed al
 *    arranque con upsert por valor; la API lo muta después.
 * 2. SNAPSHOT FEEDER: El matcher reconstruye sus estructuras desde
 *    'fetch_all' tras cada mutación.
 * =================================================================
 */

use crate::errors::DbError;
use crate::DbClient;
use chrono::Utc;
use libsql::params;
use panoptes_domain_models::indicator::{Indicator, IndicatorKind};
use tracing::{info, instrument};
use uuid::Uuid;

/// Resultado de una siembra de fichero.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeedReport {
    pub loaded: usize,
    pub skipped: usize,
}

pub struct IndicatorRepository {
    database_client: DbClient,
}

impl IndicatorRepository {
    pub fn new(client: DbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Inserta o refresca un indicador individual (mutación vía API).
     */
    #[instrument(skip(self))]
    pub async fn upsert_indicator(
        &self,
        kind: IndicatorKind,
        value: &str,
    ) -> Result<Indicator, DbError> {
        let connection = self.database_client.get_connection()?;
        let indicator_identifier = Uuid::new_v4().to_string();
        let loaded_at = Utc::now();

        connection
            .execute(
                "INSERT INTO indicators (id, kind, value, confidence, loaded_at)
                 VALUES (?1, ?2, ?3, 1.0, CURRENT_TIMESTAMP)
                 ON CONFLICT(value) DO UPDATE SET loaded_at = CURRENT_TIMESTAMP",
                params![indicator_identifier.clone(), kind_label(kind), value],
            )
            .await?;

        Ok(Indicator {
            id: indicator_identifier,
            kind,
            value: value.to_string(),
            confidence: 1.0,
            loaded_at,
        })
    }

    /**
     * Siembra el feed desde las líneas del fichero de amenazas.
     * Comentarios, líneas vacías y entradas ilegibles se omiten.
     */
    #[instrument(skip(self, file_lines))]
    pub async fn seed_from_lines<'a>(
        &self,
        file_lines: impl Iterator<Item = &'a str>,
    ) -> Result<SeedReport, DbError> {
        let mut seed_report = SeedReport::default();

        for raw_line in file_lines {
            match Indicator::parse_line(raw_line) {
                Some((indicator_kind, indicator_value)) => {
                    self.upsert_indicator(indicator_kind, &indicator_value).await?;
                    seed_report.loaded += 1;
                }
                None => seed_report.skipped += 1,
            }
        }

        info!(
            "🧬 [THREAT_SEED]: Feed leveled with {} indicators ({} lines skipped).",
            seed_report.loaded, seed_report.skipped
        );
        Ok(seed_report)
    }

    pub async fn fetch_all(&self) -> Result<Vec<Indicator>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query("SELECT id, kind, value, confidence, loaded_at FROM indicators ORDER BY value", ())
            .await?;

        let mut hydrated_indicators = Vec::new();
        while let Some(row) = rows.next().await? {
            let kind_raw: String = row.get(1)?;
            let loaded_at_raw: String = row.get(4)?;
            hydrated_indicators.push(Indicator {
                id: row.get(0)?,
                kind: parse_kind(&kind_raw),
                value: row.get(2)?,
                confidence: row.get(3)?,
                loaded_at: parse_sqlite_timestamp(&loaded_at_raw),
            });
        }
        Ok(hydrated_indicators)
    }

    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, indicator_id: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let affected_rows = connection
            .execute("DELETE FROM indicators WHERE id = ?1", params![indicator_id])
            .await?;

        if affected_rows == 0 {
            return Err(DbError::IndicatorNotFound);
        }
        Ok(())
    }
}

/// CURRENT_TIMESTAMP de SQLite viaja como 'YYYY-MM-DD HH:MM:SS' en UTC.
fn parse_sqlite_timestamp(raw: &str) -> chrono::DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

fn kind_label(kind: IndicatorKind) -> &'static str {
    match kind {
        IndicatorKind::Cidr => "cidr",
        IndicatorKind::Domain => "domain",
    }
}

fn parse_kind(raw: &str) -> IndicatorKind {
    match raw {
        "domain" => IndicatorKind::Domain,
        _ => IndicatorKind::Cidr,
    }
}
