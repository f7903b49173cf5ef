// [libs/domain/enrichment/src/scoring.rs]
/*!
 * =================================================================
 * APARATO: DETERMINISTIC RISK RUBRIC (V2.0)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: PUNTUACIÓN PURA DE RIESGO 0..=100
 *
 * # Mathematical Proof (Rubric Determinism):
 * La puntuación es función exclusiva de (dst_port, src_port, bytes,
 * matches != vacío). Sin estado, sin reloj: dos evaluaciones del mismo
 * registro producen el mismo escalar.
 * =================================================================
 */

use panoptes_domain_models::FlowRecord;

/// Base de toda observación.
const BASE_SCORE: u8 = 10;
/// Peso de cualquier coincidencia de inteligencia de amenazas.
const TI_MATCH_WEIGHT: u8 = 60;
/// Peso de un puerto de destino de alto riesgo.
const RISKY_PORT_WEIGHT: u8 = 10;
/// Peso de la combinación puerto efímero de origen + volumen alto.
const EPHEMERAL_VOLUME_WEIGHT: u8 = 10;
/// Umbral de bytes para la regla de volumen alto.
const HIGH_VOLUME_BYTES: u64 = 1_000_000;
/// Frontera inferior de los puertos efímeros/registrados.
const EPHEMERAL_PORT_FLOOR: u16 = 1024;

/// Puertos de destino históricamente abusados.
pub const RISKY_DESTINATION_PORTS: [u16; 4] = [23, 445, 1433, 3389];

/**
 * Rúbrica determinista de riesgo.
 *
 *   base 10
 *   +60 si hay cualquier coincidencia TI
 *   +10 si el puerto de destino pertenece al conjunto de riesgo
 *   +10 si src_port >= 1024 y bytes > 1_000_000
 *   clamp a [0, 100]
 */
pub fn score_record(flow: &FlowRecord, has_ti_match: bool) -> u8 {
    let mut accumulated_score: u16 = BASE_SCORE as u16;

    if has_ti_match {
        accumulated_score += TI_MATCH_WEIGHT as u16;
    }

    if RISKY_DESTINATION_PORTS.contains(&flow.dst_port) {
        accumulated_score += RISKY_PORT_WEIGHT as u16;
    }

    if flow.src_port >= EPHEMERAL_PORT_FLOOR && flow.bytes > HIGH_VOLUME_BYTES {
        accumulated_score += EPHEMERAL_VOLUME_WEIGHT as u16;
    }

    accumulated_score.min(100) as u8
}
