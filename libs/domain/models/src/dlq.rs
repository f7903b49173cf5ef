// [libs/domain/models/src/dlq.rs]
/*!
 * =================================================================
 * APARATO: DEAD-LETTER CONTRACT (V2.0)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: FORMA PERSISTIBLE DE LOTES CON ENTREGA FALLIDA
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Destino de exportación aguas abajo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkTarget {
    Splunk,
    Elastic,
}

impl SinkTarget {
    pub fn label(&self) -> &'static str {
        match self {
            SinkTarget::Splunk => "splunk",
            SinkTarget::Elastic => "elastic",
        }
    }
}

/**
 * Entrada de la cola de cartas muertas.
 *
 * Invariante de retención: el lote es recuperable hasta
 * 'first_attempt_at + horizonte de retención'; después se purga.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    /// Identificador estable del lote (compartido con el intento original).
    pub id: String,
    pub destination: SinkTarget,
    /// Carga original del lote tal como se intentó entregar.
    pub payload: serde_json::Value,
    pub first_attempt_at: DateTime<Utc>,
    pub last_attempt_at: DateTime<Utc>,
    pub attempts: u32,
    /// Próximo instante en que el replanificador puede reintentar.
    pub next_eligible_at: DateTime<Utc>,
    pub last_error: String,
}
