// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: PANOPTES DOMAIN MODELS HUB (V3.0 - GATEWAY ALIGNED)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: PUNTO ÚNICO DE VERDAD PARA LOS CONTRATOS DEL DOMINIO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TAGGED SOVEREIGNTY: Todo registro que cruza una frontera de
 *    componente viaja como variante etiquetada con campos explícitos.
 * 2. ADAPTER EDGE: La normalización de formatos externos (Zeek, flows,
 *    NetFlow JSON) ocurre únicamente en el borde de ingesta.
 * 3. HYGIENE: Sin lógica de transporte ni de persistencia en este estrato.
 * =================================================================
 */

pub mod record;
pub mod source;
pub mod indicator;
pub mod audit;
pub mod dlq;
pub mod metrics;
pub mod ingest;
pub mod adapters;

pub use record::{AsnContext, EnrichedRecord, FlowRecord, GeoContext, TiContext, TransportProtocol};
pub use source::{ObservedOrigin, Source, SourceKind, SourceStatus};
pub use indicator::{Indicator, IndicatorKind};
pub use audit::{AuditEntry, RequestResult, TimelineEvent, TimelineStage};
pub use dlq::{DlqEntry, SinkTarget};
pub use ingest::{IngestFormat, IngestOutcome, IngestRequestEnvelope, RecordFault};
