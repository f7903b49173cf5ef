// [libs/infra/db/src/client.rs]
/*!
 * =================================================================
 * APARATO: LEDGER CONNECTION CLIENT (V4.0 - MODE CLASSIFIED)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CLASIFICACIÓN DEL ENLACE Y MIGRACIONES AL ARRANQUE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. MODE TRIAD: La URL se clasifica en {memoria, fichero, remoto};
 *    cada modo decide builder, credenciales y ciclo de vida del ancla.
 * 2. SINGLE MIGRATION LINK: Las migraciones corren sobre una única
 *    conexión; en modo memoria esa misma conexión queda retenida,
 *    porque SQLite descarta una base RAM sin conexiones vivas.
 * =================================================================
 */

use crate::errors::DbError;
use crate::schema::apply_full_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Naturaleza del enlace según la URL configurada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionMode {
    /// Base efímera compartida entre hilos del proceso.
    Memory,
    /// Fichero SQLite local.
    LocalFile,
    /// Cluster libSQL remoto; exige token de acceso.
    Remote,
}

fn classify_connection_url(database_url: &str) -> ConnectionMode {
    if database_url.starts_with("libsql://") || database_url.starts_with("https://") {
        ConnectionMode::Remote
    } else if database_url.contains(":memory:") || database_url.contains("mode=memory") {
        ConnectionMode::Memory
    } else {
        ConnectionMode::LocalFile
    }
}

#[derive(Clone)]
pub struct DbClient {
    ledger_driver: Arc<Database>,
    /// Conexión de migración retenida en modo memoria; su cierre
    /// destruiría la base RAM junto con el esquema recién aplicado.
    _ram_keepalive_link: Option<Arc<Connection>>,
}

impl DbClient {
    /**
     * Clasifica la URL, abre el driver y ejecuta las migraciones
     * idempotentes sobre una conexión dedicada. El gateway permanece
     * en 'warming_up' hasta que esta rutina retorna.
     *
     * # Errors:
     * - `ConfigurationError`: URL vacía o modo remoto sin token.
     * - `ConnectionError`: driver rechazado o migraciones fallidas.
     */
    #[instrument(skip(access_token))]
    pub async fn connect(
        database_url: &str,
        access_token: Option<String>,
    ) -> Result<Self, DbError> {
        if database_url.trim().is_empty() {
            return Err(DbError::ConfigurationError("DATABASE_URL is empty".into()));
        }

        let connection_mode = classify_connection_url(database_url);
        info!("🔌 [LEDGER]: Opening {:?} link to [{}]", connection_mode, database_url);

        let ledger_driver = Arc::new(open_driver(database_url, access_token, connection_mode).await?);

        // Una sola conexión cubre todas las migraciones del arranque.
        let migration_link = ledger_driver.connect().map_err(|link_fault| {
            DbError::ConnectionError(format!("migration link refused: {}", link_fault))
        })?;

        apply_full_schema(&migration_link).await.map_err(|migration_fault| {
            DbError::ConnectionError(format!("startup migrations failed: {}", migration_fault))
        })?;

        let ram_keepalive_link = match connection_mode {
            ConnectionMode::Memory => {
                info!("⚓ [LEDGER]: RAM strata pinned by the migration link.");
                Some(Arc::new(migration_link))
            }
            _ => None,
        };

        Ok(Self { ledger_driver, _ram_keepalive_link: ram_keepalive_link })
    }

    pub fn get_connection(&self) -> Result<Connection, DbError> {
        self.ledger_driver.connect().map_err(|allocation_fault| {
            error!("⚠️ [LEDGER]: Connection allocation failed: {}", allocation_fault);
            DbError::ConnectionError(allocation_fault.to_string())
        })
    }
}

async fn open_driver(
    database_url: &str,
    access_token: Option<String>,
    connection_mode: ConnectionMode,
) -> Result<Database, DbError> {
    let build_result = match connection_mode {
        ConnectionMode::Remote => {
            let Some(token) = access_token.filter(|token| !token.is_empty()) else {
                return Err(DbError::ConfigurationError(
                    "remote ledger requires TURSO_AUTH_TOKEN".into(),
                ));
            };
            Builder::new_remote(database_url.to_string(), token).build().await
        }
        ConnectionMode::Memory | ConnectionMode::LocalFile => {
            Builder::new_local(database_url).build().await
        }
    };

    build_result.map_err(|builder_fault| {
        DbError::ConnectionError(format!(
            "libsql builder rejected '{}': {}",
            database_url, builder_fault
        ))
    })
}
