// [libs/domain/models/src/audit.rs]
/*!
 * =================================================================
 * APARATO: REQUEST AUDIT CONTRACT (V4.0 - FITNESS CORE)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: ENTRADA INMUTABLE DE AUDITORÍA Y CÁLCULO DE FITNESS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CORE FITNESS: La salud por petición se calcula aquí, en el dominio,
 *    para que cualquier cliente renderice un valor consistente.
 * 2. TIMELINE STRATA: Los hitos del ciclo de vida viajan como eventos
 *    etiquetados con metadatos estructurados.
 * 3. CLAMP DISCIPLINE: Las penalizaciones se acumulan sin recorte y el
 *    clamp a [0,1] se aplica una única vez al final.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Penalización por fallo de validación de registros.
const PENALTY_VALIDATION_FAILURE: f64 = 0.3;
/// Penalización por cada sink con fallo de exportación reportado.
const PENALTY_EXPORT_FAILURE_PER_SINK: f64 = 0.3;
/// Penalización por estado HTTP >= 400.
const PENALTY_ERROR_STATUS: f64 = 0.4;

/// Hito del ciclo de vida de una petición.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineStage {
    Received,
    Validated,
    Enriched,
    Exported,
    Completed,
    Posthook,
}

/// Evento de línea de tiempo con metadatos opcionales.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub stage: TimelineStage,
    /// Desplazamiento en milisegundos desde la recepción de la petición.
    pub offset_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

/// Clasificación semántica del resultado de la petición.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestResult {
    Ok,
    ClientError,
    ServerError,
    Blocked,
    RateLimited,
}

impl RequestResult {
    /// Deriva la clase de resultado a partir del estado HTTP.
    /// Los veredictos de admisión (blocked/rate_limited) se fijan aguas arriba.
    pub fn from_status(status: u16) -> Self {
        match status {
            0..=399 => RequestResult::Ok,
            400..=499 => RequestResult::ClientError,
            _ => RequestResult::ServerError,
        }
    }
}

/**
 * Entrada inmutable de auditoría por petición HTTP completada.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Identificador de traza; actúa como id único de la entrada.
    pub trace_id: String,
    /// Secuencia monótona asignada por el anillo, para reanudación de streams.
    #[serde(default)]
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration_ms: u64,
    pub client_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Huella de la clave API: primeros y últimos 3 caracteres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_fingerprint: Option<String>,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub result: RequestResult,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Salud escalar de la petición en [0,1].
    pub fitness: f64,
}

/**
 * Huella no reversible de una clave API para el rastro de auditoría.
 * Claves de 6 caracteres o menos se ofuscan por completo.
 */
pub fn fingerprint_api_key(raw_key: &str) -> String {
    let char_buffer: Vec<char> = raw_key.chars().collect();
    if char_buffer.len() <= 6 {
        return "***".to_string();
    }

    let head: String = char_buffer[..3].iter().collect();
    let tail: String = char_buffer[char_buffer.len() - 3..].iter().collect();
    format!("{}…{}", head, tail)
}

/**
 * Calcula el valor de fitness de una petición completada.
 *
 * Rúbrica: 1.0 en 'received'; -0.3 si la validación reportó registros
 * rechazados; -0.3 por cada sink con fallo en los metadatos de export;
 * -0.4 si el estado es >= 400. Clamp final a [0,1].
 */
pub fn compute_fitness(status: u16, timeline: &[TimelineEvent]) -> f64 {
    let mut fitness_accumulator = 1.0_f64;

    for timeline_event in timeline {
        let Some(event_meta) = &timeline_event.meta else {
            continue;
        };

        if timeline_event.stage == TimelineStage::Validated {
            let rejected_records = event_meta
                .get("rejected_records")
                .and_then(|value| value.as_u64())
                .unwrap_or(0);
            if rejected_records > 0 {
                fitness_accumulator -= PENALTY_VALIDATION_FAILURE;
            }
        }

        if matches!(timeline_event.stage, TimelineStage::Exported | TimelineStage::Posthook) {
            if let Some(failed_sinks) = event_meta.get("failed_sinks").and_then(|value| value.as_array()) {
                fitness_accumulator -= PENALTY_EXPORT_FAILURE_PER_SINK * failed_sinks.len() as f64;
            }
        }
    }

    if status >= 400 {
        fitness_accumulator -= PENALTY_ERROR_STATUS;
    }

    fitness_accumulator.clamp(0.0, 1.0)
}
