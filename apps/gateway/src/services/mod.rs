// [apps/gateway/src/services/mod.rs]
/*!
 * =================================================================
 * APARATO: SERVICE STRATA MATRIX (V4.0)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: ORQUESTACIÓN DE DAEMONS Y MOTORES DEL GATEWAY
 * =================================================================
 */

// --- ESTRATO DE SEÑALES ---

/// Difusión de auditoría y logs hacia los enlaces SSE.
pub mod event_bus;

// --- ESTRATO DE INGESTA Y ENRIQUECIMIENTO ---

/// Motor de validación, enriquecimiento y entrega (C7).
pub mod pipeline;
/// Cabezal UDP: lector de datagramas + mapper canónico (C6).
pub mod udp_head;

// --- ESTRATO DE EXPORTACIÓN Y RESILIENCIA ---

/// Workers coalescentes hacia Splunk HEC y Elastic bulk (C9).
pub mod export;
/// Redelivery lento y compactación de la cola de cartas muertas.
pub mod dlq_replay;

// --- ESTRATO DE HIGIENE Y OBSERVABILIDAD ---

/// Marcapasos 1 Hz del anillo de ventanas de métricas.
pub mod ticker;
/// Podador de auditoría, idempotencia y touches write-behind.
pub mod pruner;
/// Puerto de sincronización de allowlists hacia el firewall del host.
pub mod firewall;

pub use event_bus::EventBus;
pub use export::{ExportMailbox, ExportWorker, SinkRouter};
pub use pipeline::IngestPipeline;
