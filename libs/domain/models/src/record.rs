// [libs/domain/models/src/record.rs]
/*!
 * =================================================================
 * APARATO: CANONICAL FLOW RECORD CONTRACT (V3.2 - ENRICHMENT SYNC)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: FORMA CANÓNICA DE OBSERVACIÓN Y SU VERSIÓN ENRIQUECIDA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. PROTOCOL DUALITY: El transporte acepta etiquetas textuales ("tcp")
 *    y números IANA (6) en la deserialización, emitiendo siempre la
 *    etiqueta canónica en minúsculas hacia los sinks.
 * 2. NULLABLE STRATA: Los bloques geo/asn son opcionales campo a campo,
 *    preservando el invariante de presencia estructural del registro.
 * 3. ZERO SHARED MUTATION: Los registros viajan por valor a través del
 *    pipeline; ningún estrato retiene referencias mutables.
 * =================================================================
 */

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;
use uuid::Uuid;

/// Protocolo de transporte de la observación, en la taxonomía canónica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProtocol {
    Tcp,
    Udp,
    Icmp,
    /// Número de protocolo IANA fuera de la tríada canónica.
    Other(u8),
}

impl TransportProtocol {
    /// Etiqueta textual canónica emitida hacia los sinks.
    pub fn label(&self) -> String {
        match self {
            TransportProtocol::Tcp => "tcp".to_string(),
            TransportProtocol::Udp => "udp".to_string(),
            TransportProtocol::Icmp => "icmp".to_string(),
            TransportProtocol::Other(number) => format!("other({})", number),
        }
    }

    /// Mapea un número de protocolo IANA a la variante canónica.
    pub fn from_iana(number: u8) -> Self {
        match number {
            6 => TransportProtocol::Tcp,
            17 => TransportProtocol::Udp,
            1 | 58 => TransportProtocol::Icmp,
            other => TransportProtocol::Other(other),
        }
    }

    /// Interpreta una etiqueta textual laxa ("TCP", "udp", "6").
    pub fn parse_label(raw_label: &str) -> Self {
        match raw_label.to_ascii_lowercase().as_str() {
            "tcp" => TransportProtocol::Tcp,
            "udp" => TransportProtocol::Udp,
            "icmp" | "icmp6" | "icmpv6" => TransportProtocol::Icmp,
            other => match other.parse::<u8>() {
                Ok(number) => TransportProtocol::from_iana(number),
                Err(_) => TransportProtocol::Other(255),
            },
        }
    }
}

impl Serialize for TransportProtocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

struct TransportProtocolVisitor;

impl<'de> Visitor<'de> for TransportProtocolVisitor {
    type Value = TransportProtocol;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a protocol label (\"tcp\") or an IANA protocol number")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(TransportProtocol::parse_label(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(TransportProtocol::from_iana(value.min(255) as u8))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(TransportProtocol::from_iana(value.clamp(0, 255) as u8))
    }
}

impl<'de> Deserialize<'de> for TransportProtocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TransportProtocolVisitor)
    }
}

/**
 * Registro canónico de observación de red.
 *
 * Toda ruta de ingesta (HTTP o UDP) normaliza hacia esta forma antes
 * de tocar el pipeline de enriquecimiento.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRecord {
    /// Marca de tiempo epoch con resolución sub-segundo.
    pub ts: f64,
    /// Dirección de origen de la observación.
    pub src_ip: IpAddr,
    /// Puerto de origen.
    pub src_port: u16,
    /// Dirección de destino de la observación.
    pub dst_ip: IpAddr,
    /// Puerto de destino.
    pub dst_port: u16,
    /// Protocolo de transporte canónico.
    pub protocol: TransportProtocol,
    /// Volumen de bytes observados en el flujo.
    pub bytes: u64,
    /// Volumen de paquetes observados en el flujo.
    pub packets: u64,
    /// Etiqueta de servicio reportada por el sensor (ej. "dns").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Pistas de capa de aplicación sin esquema fijo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_hints: Option<serde_json::Value>,
}

impl FlowRecord {
    /// Dirección primaria para enriquecimiento: destino preferido.
    pub fn primary_address(&self) -> IpAddr {
        self.dst_ip
    }
}

/// Contexto geográfico resuelto; cada campo es anulable por contrato.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoContext {
    pub country: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Contexto de sistema autónomo resuelto.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AsnContext {
    pub number: Option<u32>,
    pub organization: Option<String>,
}

/// Bloque de inteligencia de amenazas del registro.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TiContext {
    /// Indicadores coincidentes, prefijo más largo primero.
    pub matches: Vec<String>,
}

/**
 * Registro enriquecido: la forma canónica más el contexto resuelto.
 *
 * Invariante estructural: geo/asn presentes (posiblemente null),
 * ti.matches presente (posiblemente vacío), risk_score en 0..=100.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedRecord {
    /// Identificador estable del registro (UUID v4).
    pub record_id: String,
    #[serde(flatten)]
    pub flow: FlowRecord,
    pub geo: Option<GeoContext>,
    pub asn: Option<AsnContext>,
    pub ti: TiContext,
    /// Puntuación de riesgo determinista en 0..=100.
    pub risk_score: u8,
}

impl EnrichedRecord {
    /// Ensambla un registro enriquecido con identidad recién acuñada.
    pub fn assemble(
        flow: FlowRecord,
        geo: Option<GeoContext>,
        asn: Option<AsnContext>,
        ti_matches: Vec<String>,
        risk_score: u8,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4().to_string(),
            flow,
            geo,
            asn,
            ti: TiContext { matches: ti_matches },
            risk_score: risk_score.min(100),
        }
    }
}
