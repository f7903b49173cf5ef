// [libs/infra/netflow/src/lib.rs]
/*!
 * =================================================================
 * APARATO: NETFLOW HEAD CODEC HUB (V3.0 - TEMPLATE AWARE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: DATAGRAMA CRUDO -> REGISTROS CANÓNICOS + COLA ACOTADA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. RECOGNIZER FIRST: La palabra de versión del datagrama decide el
 *    decodificador (v5 fijo, v9/IPFIX con plantillas).
 * 2. IN-PROCESS QUEUE: La cola acotada sustituye al named pipe del
 *    diseño heredado, eliminando su clase de bugs de framing.
 * 3. NON-FATAL DECODE: Un datagrama malformado incrementa contadores;
 *    jamás tumba el cabezal.
 * =================================================================
 */

pub mod errors;
pub mod queue;
pub mod recognizer;
pub mod template;
mod v5;
mod v9;

pub use errors::DecodeError;
pub use queue::{BoundedQueue, OverflowPolicy, PushOutcome};
pub use recognizer::WireFormat;

use panoptes_domain_models::FlowRecord;
use template::TemplateCache;

/// Resultado de decodificar un datagrama completo.
#[derive(Debug, Default)]
pub struct DecodedDatagram {
    pub format: Option<WireFormat>,
    pub records: Vec<FlowRecord>,
    /// Conjuntos de datos omitidos por plantilla desconocida.
    pub skipped_sets: u32,
    /// Registros descartados por carecer de direcciones utilizables.
    pub faulted_records: u32,
}

/**
 * Decodificador con estado de plantillas v9/IPFIX entre datagramas.
 *
 * Propiedad de un único lector UDP; no requiere sincronización interna.
 */
#[derive(Debug, Default)]
pub struct DatagramDecoder {
    template_cache: TemplateCache,
}

impl DatagramDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /**
     * Decodifica un datagrama según su palabra de versión.
     *
     * # Errors:
     * 'DecodeError' cubre datagramas truncados o de versión desconocida;
     * el caller los contabiliza como 'decode_errors_total'.
     */
    pub fn decode(&mut self, payload: &[u8]) -> Result<DecodedDatagram, DecodeError> {
        let wire_format = recognizer::recognize(payload)?;

        match wire_format {
            WireFormat::V5 => v5::decode_v5(payload),
            WireFormat::V9 => v9::decode_v9(payload, &mut self.template_cache),
            WireFormat::Ipfix => v9::decode_ipfix(payload, &mut self.template_cache),
        }
    }

    /// Plantillas actualmente aprendidas (instrumentación de salud).
    pub fn cached_template_count(&self) -> usize {
        self.template_cache.len()
    }
}
