// [libs/domain/enrichment/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ENRICHMENT ENGINE HUB (V3.1 - HOT-SWAP GOLD)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: GEO/ASN + INTELIGENCIA DE AMENAZAS + RIESGO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. NO-THROW DISCIPLINE: Los motores jamás propagan error hacia el
 *    pipeline: entrada inválida o base ausente degradan a null/vacío.
 * 2. ATOMIC HANDLES: Los lectores geo y el snapshot de amenazas viven
 *    tras manijas atómicas; la recarga es un swap sin bloquear lectores.
 * 3. HOT-PATH PURITY: Las búsquedas son síncronas y sin asignaciones
 *    más allá de la estructura devuelta.
 * =================================================================
 */

pub mod geo;
pub mod intel;
pub mod scoring;
mod trie;

pub use geo::{GeoAsnAnswer, GeoEngine, GeoStatus};
pub use intel::{ThreatMatcher, ThreatSnapshot, ThreatStatus};
pub use scoring::score_record;

use panoptes_domain_models::record::{AsnContext, FlowRecord, GeoContext};

/// Veredicto completo de enriquecimiento para un registro canónico.
#[derive(Debug, Clone)]
pub struct EnrichmentVerdict {
    pub geo: Option<GeoContext>,
    pub asn: Option<AsnContext>,
    /// Indicadores coincidentes, prefijo más largo primero.
    pub ti_matches: Vec<String>,
    pub risk_score: u8,
}

/**
 * Fachada de enriquecimiento consumida por el pipeline de ingesta.
 */
pub struct EnrichmentHub {
    geo_engine: GeoEngine,
    threat_matcher: ThreatMatcher,
}

impl EnrichmentHub {
    pub fn new(geo_engine: GeoEngine, threat_matcher: ThreatMatcher) -> Self {
        Self { geo_engine, threat_matcher }
    }

    pub fn geo(&self) -> &GeoEngine {
        &self.geo_engine
    }

    pub fn intel(&self) -> &ThreatMatcher {
        &self.threat_matcher
    }

    /**
     * Enriquece un registro canónico: dirección primaria (destino
     * preferido), contexto geo/ASN, coincidencias TI y rúbrica de riesgo.
     *
     * Ley de idempotencia: el veredicto depende únicamente de los campos
     * del registro canónico; repetir la operación no altera el resultado.
     */
    pub fn enrich(&self, flow: &FlowRecord) -> EnrichmentVerdict {
        let primary_address = flow.primary_address();
        let geo_answer = self.geo_engine.lookup(primary_address);

        let mut ti_matches = self.threat_matcher.match_ip(flow.src_ip);
        for destination_match in self.threat_matcher.match_ip(flow.dst_ip) {
            if !ti_matches.contains(&destination_match) {
                ti_matches.push(destination_match);
            }
        }

        if let Some(domain_hint) = extract_domain_hint(flow) {
            for domain_match in self.threat_matcher.match_domain(&domain_hint) {
                if !ti_matches.contains(&domain_match) {
                    ti_matches.push(domain_match);
                }
            }
        }

        let risk_score = score_record(flow, !ti_matches.is_empty());

        EnrichmentVerdict {
            geo: geo_answer.geo,
            asn: geo_answer.asn,
            ti_matches,
            risk_score,
        }
    }
}

/// Extrae la pista de dominio de las sugerencias de capa de aplicación.
fn extract_domain_hint(flow: &FlowRecord) -> Option<String> {
    let hints_object = flow.app_hints.as_ref()?.as_object()?;

    for hint_key in ["host", "domain", "query", "server_name"] {
        if let Some(hint_value) = hints_object.get(hint_key).and_then(|value| value.as_str()) {
            let normalized_hint = hint_value.trim().trim_end_matches('.').to_ascii_lowercase();
            if !normalized_hint.is_empty() {
                return Some(normalized_hint);
            }
        }
    }

    None
}
