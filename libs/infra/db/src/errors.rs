// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG (V3.1)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico o de red con el motor libSQL.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo en la configuración del entorno (variables vacías o malformadas).
    #[error("[L3_DB_CONFIG_FAULT]: ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    // --- ESTRATO DE ENTIDADES DEL GATEWAY ---

    /// La fuente solicitada no existe en el registro.
    #[error("[L3_SOURCE_FAULT]: IDENTIFIER_NOT_FOUND")]
    SourceNotFound,

    /// El indicador solicitado no existe en el feed persistido.
    #[error("[L3_INDICATOR_FAULT]: IDENTIFIER_NOT_FOUND")]
    IndicatorNotFound,

    /// La entrada de cartas muertas no existe o expiró su retención.
    #[error("[L3_DLQ_FAULT]: BATCH_NOT_FOUND")]
    DlqEntryNotFound,
}
