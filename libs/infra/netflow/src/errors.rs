// [libs/infra/netflow/src/errors.rs]
/*!
 * =================================================================
 * APARATO: NETFLOW DECODE ERROR CATALOG (V2.0)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE DECODIFICACIÓN
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// El datagrama no alcanza el tamaño mínimo de su cabecera.
    #[error("[L3_NETFLOW_FAULT]: DATAGRAM_TRUNCATED -> need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// La palabra de versión no corresponde a v5, v9 ni IPFIX.
    #[error("[L3_NETFLOW_FAULT]: UNKNOWN_VERSION_WORD -> {0}")]
    UnknownVersion(u16),

    /// Longitud interna inconsistente con el tamaño físico del datagrama.
    #[error("[L3_NETFLOW_FAULT]: LENGTH_FIELD_VIOLATION -> {0}")]
    LengthViolation(String),

    /// Registro de plantilla estructuralmente inválido.
    #[error("[L3_NETFLOW_FAULT]: TEMPLATE_MALFORMED -> {0}")]
    TemplateMalformed(String),
}
