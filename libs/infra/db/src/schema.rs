// [libs/infra/db/src/schema.rs]
/**
 * =================================================================
 * APARATO: GATEWAY DATABASE SCHEMA (V12.0 - ADMISSION STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. ADMISSION READY: Tablas de fuentes con allowlist JSON y límites EPS.
 * 2. AT-LEAST-ONCE: La cola de cartas muertas preserva lotes fallidos
 *    hasta su horizonte de retención.
 * 3. IDEMPOTENCIA: Migraciones en caliente tolerantes a columnas previas.
 * 4. PERFORMANCE: Índices de aceleración para la poda y el replay.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 * Define las entidades persistidas del gateway.
 */
const GATEWAY_TABLES: &[(&str, &str)] = &[
    ("TABLE_SOURCES", r#"
        CREATE TABLE IF NOT EXISTS sources (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            display_name TEXT NOT NULL,
            declared_type TEXT NOT NULL DEFAULT 'http',
            status TEXT NOT NULL DEFAULT 'enabled',
            allowed_ips TEXT NOT NULL DEFAULT '[]',
            max_eps INTEGER NOT NULL DEFAULT 0,
            block_on_exceed INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_INDICATORS", r#"
        CREATE TABLE IF NOT EXISTS indicators (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            value TEXT NOT NULL UNIQUE,
            confidence REAL NOT NULL DEFAULT 1.0,
            loaded_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_IDEMPOTENCY", r#"
        CREATE TABLE IF NOT EXISTS idempotency_records (
            tenant_id TEXT NOT NULL,
            endpoint TEXT NOT NULL,
            client_key TEXT NOT NULL,
            response_status INTEGER NOT NULL,
            response_body TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            expires_at DATETIME NOT NULL,
            PRIMARY KEY (tenant_id, endpoint, client_key)
        );
    "#),
    ("TABLE_DLQ", r#"
        CREATE TABLE IF NOT EXISTS dlq_batches (
            id TEXT PRIMARY KEY,
            destination TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            first_attempt_at DATETIME NOT NULL,
            last_attempt_at DATETIME NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            next_eligible_at DATETIME NOT NULL,
            last_error TEXT NOT NULL DEFAULT ''
        );
    "#),
];

/**
 * ESTRATO 2: EVOLUCIÓN (Mutaciones de Columna)
 * Asegura que las tablas de despliegues previos adquieran las
 * capacidades nuevas sin reconstrucción.
 */
const EVOLUTIONARY_STRATA: &[(&str, &str)] = &[
    // --- OBSERVACIÓN DE ORIGEN Y ETIQUETADO DE COLECTOR ---
    ("SOURCE_OBSERVED_ORIGIN", "ALTER TABLE sources ADD COLUMN observed_origin TEXT NOT NULL DEFAULT 'unknown'"),
    ("SOURCE_COLLECTOR_LABEL", "ALTER TABLE sources ADD COLUMN collector_label TEXT"),
    ("SOURCE_LAST_SEEN", "ALTER TABLE sources ADD COLUMN last_seen DATETIME"),
];

/**
 * ESTRATO 3: ENDURECIMIENTO (Índices de Aceleración)
 * Optimiza la poda por TTL y el escrutinio de replay del DLQ.
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_SOURCES_TENANT", "CREATE INDEX IF NOT EXISTS idx_sources_tenant ON sources(tenant_id);"),
    ("IDX_IDEMPOTENCY_EXPIRY", "CREATE INDEX IF NOT EXISTS idx_idempotency_expiry ON idempotency_records(expires_at);"),
    ("IDX_DLQ_ELIGIBILITY", "CREATE INDEX IF NOT EXISTS idx_dlq_eligibility ON dlq_batches(next_eligible_at);"),
    ("IDX_DLQ_RETENTION", "CREATE INDEX IF NOT EXISTS idx_dlq_retention ON dlq_batches(first_attempt_at);"),
];

/**
 * Ejecuta la secuencia maestra de sincronización del esquema.
 *
 * # Errors:
 * Retorna error si alguna tabla base falla en solidificarse; el kernel
 * mantiene el gateway en 'warming_up' y aborta el arranque.
 */
#[instrument(skip(database_connection))]
pub async fn apply_full_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA_ENGINE]: Initiating structural synchronization V12.0...");

    solidify_base_strata(database_connection).await?;
    execute_evolutionary_repair(database_connection).await?;
    harden_access_layer(database_connection).await?;

    info!("✅ [SCHEMA_ENGINE]: Gateway ledger V12.0 level and certified.");
    Ok(())
}

async fn solidify_base_strata(db: &Connection) -> Result<()> {
    for (identifier, sql) in GATEWAY_TABLES {
        debug!("  ↳ Solidifying: {}", identifier);
        db.execute(*sql, ())
            .await
            .with_context(|| format!("CRITICAL_SOLIDIFICATION_FAULT: {}", identifier))?;
    }
    Ok(())
}

async fn execute_evolutionary_repair(db: &Connection) -> Result<()> {
    for (identifier, sql) in EVOLUTIONARY_STRATA {
        match db.execute(*sql, ()).await {
            Ok(_) => info!("  🟢 [REPAIR_OK]: Applied evolutionary stratum {}", identifier),
            Err(e) => {
                let message = e.to_string();
                if message.contains("duplicate column name") {
                    debug!("  ⚪ [REPAIR_SKIP]: {} already level.", identifier);
                } else {
                    warn!("  ⚠️ [REPAIR_BYPASS]: {} check incomplete: {}", identifier, message);
                }
            }
        }
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  ↳ Hardening: {}", identifier);
        db.execute(*sql, ())
            .await
            .with_context(|| format!("CRITICAL_HARDENING_FAULT: {}", identifier))?;
    }
    Ok(())
}
