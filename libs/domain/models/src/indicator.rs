// [libs/domain/models/src/indicator.rs]
/*!
 * =================================================================
 * APARATO: THREAT INDICATOR CONTRACT (V1.4)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: FORMA PERSISTIBLE DE LOS INDICADORES DE AMENAZA
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Naturaleza del indicador: bloque CIDR o dominio exacto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Cidr,
    Domain,
}

/// Indicador de inteligencia de amenazas.
/// La confianza es fija en 1.0 para la versión actual del contrato.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicator {
    pub id: String,
    pub kind: IndicatorKind,
    /// Valor textual: "45.149.3.0/24" o "malware.example.net".
    pub value: String,
    pub confidence: f64,
    pub loaded_at: DateTime<Utc>,
}

impl Indicator {
    /**
     * Interpreta una línea del fichero de amenazas.
     *
     * Gramática: líneas '#' y vacías se ignoran; 'domain:<nombre>' declara
     * un dominio exacto; cualquier otra línea se trata como CIDR textual.
     * La validación sintáctica del CIDR ocurre en el matcher, no aquí.
     */
    pub fn parse_line(raw_line: &str) -> Option<(IndicatorKind, String)> {
        let trimmed_line = raw_line.trim();
        if trimmed_line.is_empty() || trimmed_line.starts_with('#') {
            return None;
        }

        if let Some(domain_value) = trimmed_line.strip_prefix("domain:") {
            let normalized_domain = domain_value.trim().to_ascii_lowercase();
            if normalized_domain.is_empty() {
                return None;
            }
            return Some((IndicatorKind::Domain, normalized_domain));
        }

        Some((IndicatorKind::Cidr, trimmed_line.to_string()))
    }
}
