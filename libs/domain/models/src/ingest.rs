// [libs/domain/models/src/ingest.rs]
/*!
 * =================================================================
 * APARATO: INGEST ENVELOPE CONTRACT (V2.3 - MULTI-STATUS)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: SOBRES DE INGESTA Y FALLOS POR REGISTRO
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Cota dura de registros por lote.
pub const MAX_BATCH_RECORDS: usize = 10_000;
/// Cota dura del cuerpo crudo tras descompresión: 5 MiB.
pub const MAX_PAYLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Formatos de ingesta reconocidos en el sobre mixto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestFormat {
    #[serde(rename = "flows.v1")]
    FlowsV1,
    #[serde(rename = "zeek.conn.v1")]
    ZeekConnV1,
    #[serde(rename = "netflow.v1")]
    NetflowJson,
}

impl IngestFormat {
    pub fn parse(raw_format: &str) -> Option<Self> {
        match raw_format {
            "flows.v1" => Some(IngestFormat::FlowsV1),
            "zeek.conn.v1" => Some(IngestFormat::ZeekConnV1),
            "netflow.v1" => Some(IngestFormat::NetflowJson),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IngestFormat::FlowsV1 => "flows.v1",
            IngestFormat::ZeekConnV1 => "zeek.conn.v1",
            IngestFormat::NetflowJson => "netflow.v1",
        }
    }
}

/// Sobre de ingesta mixto: formato declarado + registros crudos.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequestEnvelope {
    pub collector_id: String,
    pub format: String,
    #[serde(default)]
    pub records: Vec<serde_json::Value>,
}

/// Fallo de un registro individual dentro de un lote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFault {
    /// Índice del registro dentro del lote recibido.
    pub index: usize,
    pub reason: String,
}

/**
 * Resultado de procesar un lote: aceptados, rechazados y sus motivos.
 * Un lote con fallos parciales se reporta con semántica 207.
 */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub accepted: usize,
    pub rejected: usize,
    #[serde(default)]
    pub errors: Vec<RecordFault>,
    /// Identificadores estables de los registros aceptados.
    #[serde(default)]
    pub record_ids: Vec<String>,
}

impl IngestOutcome {
    pub fn is_partial(&self) -> bool {
        self.rejected > 0 && self.accepted > 0
    }

    pub fn is_total_failure(&self) -> bool {
        self.accepted == 0 && self.rejected > 0
    }
}
