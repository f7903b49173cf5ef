// [libs/infra/db/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY ACCESS MATRIX (V3.0)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ORQUESTACIÓN DE SUBSISTEMAS DE PERSISTENCIA
 *
 * # Mathematical Proof (Modular Encapsulation):
 * El barrel file actúa como interfaz galvánica: los sub-módulos
 * permanecen aislados y solo las estructuras de autoridad
 * (Repositories) se exponen al exterior.
 * =================================================================
 */

// --- ESTRATO 1: ADMISIÓN Y AMENAZAS ---

/// Registro administrativo de fuentes y sus límites.
pub mod sources;
/// Feed persistido de indicadores de amenaza.
pub mod indicators;

// --- ESTRATO 2: RESILIENCIA DE PETICIONES Y ENTREGA ---

/// Respuestas memorizadas por clave de idempotencia.
pub mod idempotency;
/// Cola de cartas muertas de lotes de exportación.
pub mod dlq;

// --- RE-EXPORTACIONES SOBERANAS (NOMINAL ACCESS API) ---

pub use dlq::DlqRepository;
pub use idempotency::IdempotencyRepository;
pub use indicators::IndicatorRepository;
pub use sources::SourceRepository;

use chrono::{DateTime, SecondsFormat, Utc};

/// Formato temporal uniforme del Ledger: RFC 3339 con micros y 'Z'.
/// El ancho fijo hace que el orden lexicográfico coincida con el cronológico.
pub(crate) fn format_timestamp(moment: DateTime<Utc>) -> String {
    moment.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
