// [libs/infra/netflow/src/v5.rs]
/*!
 * =================================================================
 * APARATO: NETFLOW V5 DECODER (V2.1 - FIXED LAYOUT)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: DECODIFICACIÓN DEL FORMATO DE REGISTRO FIJO DE 48 BYTES
 * =================================================================
 */

use crate::errors::DecodeError;
use crate::recognizer::WireFormat;
use crate::DecodedDatagram;
use byteorder::{BigEndian, ByteOrder};
use panoptes_domain_models::record::{FlowRecord, TransportProtocol};
use std::net::{IpAddr, Ipv4Addr};

/// Cabecera v5: 24 bytes fijos.
const V5_HEADER_BYTES: usize = 24;
/// Registro v5: 48 bytes fijos.
const V5_RECORD_BYTES: usize = 48;
/// Cota dura del campo 'count' según el protocolo.
const V5_MAX_RECORDS: usize = 30;

/**
 * Decodifica un datagrama NetFlow v5 completo.
 *
 * La marca de tiempo canónica es el instante de exportación del
 * datagrama (unix_secs + unix_nsecs), idéntica para sus registros.
 */
pub fn decode_v5(payload: &[u8]) -> Result<DecodedDatagram, DecodeError> {
    if payload.len() < V5_HEADER_BYTES {
        return Err(DecodeError::Truncated { needed: V5_HEADER_BYTES, available: payload.len() });
    }

    let declared_count = BigEndian::read_u16(&payload[2..4]) as usize;
    if declared_count > V5_MAX_RECORDS {
        return Err(DecodeError::LengthViolation(format!(
            "v5 count {} exceeds protocol maximum {}",
            declared_count, V5_MAX_RECORDS
        )));
    }

    let export_unix_secs = BigEndian::read_u32(&payload[8..12]) as f64;
    let export_unix_nanos = BigEndian::read_u32(&payload[12..16]) as f64;
    let export_timestamp = export_unix_secs + export_unix_nanos / 1e9;

    let required_bytes = V5_HEADER_BYTES + declared_count * V5_RECORD_BYTES;
    if payload.len() < required_bytes {
        return Err(DecodeError::Truncated { needed: required_bytes, available: payload.len() });
    }

    let mut decoded_records = Vec::with_capacity(declared_count);

    for record_index in 0..declared_count {
        let record_offset = V5_HEADER_BYTES + record_index * V5_RECORD_BYTES;
        let record_slice = &payload[record_offset..record_offset + V5_RECORD_BYTES];

        let source_address = Ipv4Addr::from(BigEndian::read_u32(&record_slice[0..4]));
        let destination_address = Ipv4Addr::from(BigEndian::read_u32(&record_slice[4..8]));
        let packet_count = BigEndian::read_u32(&record_slice[16..20]) as u64;
        let byte_count = BigEndian::read_u32(&record_slice[20..24]) as u64;
        let source_port = BigEndian::read_u16(&record_slice[32..34]);
        let destination_port = BigEndian::read_u16(&record_slice[34..36]);
        let protocol_number = record_slice[38];

        decoded_records.push(FlowRecord {
            ts: export_timestamp,
            src_ip: IpAddr::V4(source_address),
            src_port: source_port,
            dst_ip: IpAddr::V4(destination_address),
            dst_port: destination_port,
            protocol: TransportProtocol::from_iana(protocol_number),
            bytes: byte_count,
            packets: packet_count,
            service: None,
            app_hints: None,
        });
    }

    Ok(DecodedDatagram {
        format: Some(WireFormat::V5),
        records: decoded_records,
        skipped_sets: 0,
        faulted_records: 0,
    })
}
