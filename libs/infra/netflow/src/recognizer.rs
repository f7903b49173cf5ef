// [libs/infra/netflow/src/recognizer.rs]
/*!
 * =================================================================
 * APARATO: WIRE FORMAT RECOGNIZER (V1.3)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CLASIFICACIÓN DEL DATAGRAMA POR PALABRA DE VERSIÓN
 * =================================================================
 */

use crate::errors::DecodeError;
use byteorder::{BigEndian, ByteOrder};

/// Formatos de exportación reconocidos en el puerto del colector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// NetFlow versión 5: cabecera y registros de tamaño fijo.
    V5,
    /// NetFlow versión 9: flowsets dirigidos por plantilla.
    V9,
    /// IPFIX (RFC 7011): palabra de versión 10.
    Ipfix,
}

impl WireFormat {
    pub fn label(&self) -> &'static str {
        match self {
            WireFormat::V5 => "netflow.v5",
            WireFormat::V9 => "netflow.v9",
            WireFormat::Ipfix => "ipfix",
        }
    }
}

/// Clasifica el datagrama inspeccionando sus dos primeros bytes.
pub fn recognize(payload: &[u8]) -> Result<WireFormat, DecodeError> {
    if payload.len() < 2 {
        return Err(DecodeError::Truncated { needed: 2, available: payload.len() });
    }

    match BigEndian::read_u16(&payload[0..2]) {
        5 => Ok(WireFormat::V5),
        9 => Ok(WireFormat::V9),
        10 => Ok(WireFormat::Ipfix),
        unknown_version => Err(DecodeError::UnknownVersion(unknown_version)),
    }
}
