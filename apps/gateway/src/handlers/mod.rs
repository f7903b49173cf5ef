// [apps/gateway/src/handlers/mod.rs]
/*!
 * =================================================================
 * APARATO: HANDLER STRATA MATRIX (V4.0)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: SUPERFICIE HTTP COMPLETA DEL GATEWAY
 * =================================================================
 */

/// Ingesta de lotes: mixto, Zeek, NetFlow y bulk.
pub mod ingest;
/// Enriquecimiento puntual de una dirección.
pub mod lookup;
/// Instantánea estructurada de métricas.
pub mod metrics;
/// Liveness, versión y estado del sistema.
pub mod system;
/// CRUD de fuentes y dry-run de admisión.
pub mod sources;
/// Mutación del feed de indicadores.
pub mod indicators;
/// Configuración y sondeo de sinks.
pub mod outputs;
/// Consultas y stream del anillo de auditoría.
pub mod requests;
/// Stream de logs estructurados.
pub mod logs;
