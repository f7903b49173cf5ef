// [libs/domain/models/src/source.rs]
/*!
 * =================================================================
 * APARATO: SOURCE IDENTITY CONTRACT (V2.1 - ADMISSION READY)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: IDENTIDAD DE FUENTES Y SUS LÍMITES DE ADMISIÓN
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tipo declarado de la fuente en el registro administrativo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Http,
    Udp,
}

/// Origen observado en tráfico real; puede divergir del declarado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservedOrigin {
    Http,
    Udp,
    Unknown,
}

impl Default for ObservedOrigin {
    fn default() -> Self {
        ObservedOrigin::Unknown
    }
}

/// Estado administrativo de la fuente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Enabled,
    Disabled,
}

/**
 * Entidad de fuente registrada.
 *
 * Invariante: 'allowed_ips' es la autoridad de admisión con independencia
 * del tipo declarado; un conjunto vacío equivale a denegar todo.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub tenant_id: String,
    pub display_name: String,
    pub declared_type: SourceKind,
    #[serde(default)]
    pub observed_origin: ObservedOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector_label: Option<String>,
    pub status: SourceStatus,
    /// Bloques CIDR autorizados (IPv4 e IPv6) en notación textual.
    #[serde(default)]
    pub allowed_ips: Vec<String>,
    /// Cota de eventos por segundo; 0 significa sin límite.
    #[serde(default)]
    pub max_eps: u32,
    /// Si es verdadero, el exceso de EPS se rechaza; si no, se admite y se cuenta.
    #[serde(default)]
    pub block_on_exceed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl Source {
    pub fn is_enabled(&self) -> bool {
        self.status == SourceStatus::Enabled
    }
}
