// [libs/infra/netflow/src/v9.rs]
/*!
 * =================================================================
 * APARATO: TEMPLATE-DRIVEN DECODER (V3.1 - V9/IPFIX UNIFIED)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: RECORRIDO DE FLOWSETS Y PROYECCIÓN CANÓNICA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SHARED WALK: v9 e IPFIX comparten el recorrido de sets; difieren
 *    solo en cabecera, ids de set de plantilla y bit de empresa.
 * 2. SKIP DISCIPLINE: Elementos desconocidos se saltan por longitud;
 *    un set con plantilla no aprendida se omite y se contabiliza.
 * 3. PADDING TOLERANCE: El relleno final menor que un registro completo
 *    se ignora conforme al RFC.
 * =================================================================
 */

use crate::errors::DecodeError;
use crate::recognizer::WireFormat;
use crate::template::{
    FieldSpec, TemplateCache, TemplateRecord, IE_IN_BYTES, IE_IN_PKTS, IE_IPV4_DST_ADDR,
    IE_IPV4_SRC_ADDR, IE_IPV6_DST_ADDR, IE_IPV6_SRC_ADDR, IE_L4_DST_PORT, IE_L4_SRC_PORT,
    IE_PROTOCOL,
};
use crate::DecodedDatagram;
use byteorder::{BigEndian, ByteOrder};
use panoptes_domain_models::record::{FlowRecord, TransportProtocol};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const V9_HEADER_BYTES: usize = 20;
const IPFIX_HEADER_BYTES: usize = 16;
const SET_HEADER_BYTES: usize = 4;

const V9_TEMPLATE_SET_ID: u16 = 0;
const V9_OPTIONS_SET_ID: u16 = 1;
const IPFIX_TEMPLATE_SET_ID: u16 = 2;
const IPFIX_OPTIONS_SET_ID: u16 = 3;
/// Primer id válido de flowset de datos en ambas generaciones.
const FIRST_DATA_SET_ID: u16 = 256;

/// Decodifica un datagrama NetFlow v9.
pub fn decode_v9(
    payload: &[u8],
    template_cache: &mut TemplateCache,
) -> Result<DecodedDatagram, DecodeError> {
    if payload.len() < V9_HEADER_BYTES {
        return Err(DecodeError::Truncated { needed: V9_HEADER_BYTES, available: payload.len() });
    }

    let export_timestamp = BigEndian::read_u32(&payload[8..12]) as f64;
    let observation_domain = BigEndian::read_u32(&payload[16..20]);

    walk_sets(
        WireFormat::V9,
        &payload[V9_HEADER_BYTES..],
        export_timestamp,
        observation_domain,
        template_cache,
    )
}

/// Decodifica un mensaje IPFIX (RFC 7011).
pub fn decode_ipfix(
    payload: &[u8],
    template_cache: &mut TemplateCache,
) -> Result<DecodedDatagram, DecodeError> {
    if payload.len() < IPFIX_HEADER_BYTES {
        return Err(DecodeError::Truncated { needed: IPFIX_HEADER_BYTES, available: payload.len() });
    }

    let declared_length = BigEndian::read_u16(&payload[2..4]) as usize;
    if declared_length > payload.len() {
        return Err(DecodeError::LengthViolation(format!(
            "ipfix message length {} exceeds datagram size {}",
            declared_length,
            payload.len()
        )));
    }

    let export_timestamp = BigEndian::read_u32(&payload[4..8]) as f64;
    let observation_domain = BigEndian::read_u32(&payload[12..16]);

    walk_sets(
        WireFormat::Ipfix,
        &payload[IPFIX_HEADER_BYTES..declared_length],
        export_timestamp,
        observation_domain,
        template_cache,
    )
}

/// Recorrido compartido de sets/flowsets para ambas generaciones.
fn walk_sets(
    wire_format: WireFormat,
    mut sets_region: &[u8],
    export_timestamp: f64,
    observation_domain: u32,
    template_cache: &mut TemplateCache,
) -> Result<DecodedDatagram, DecodeError> {
    let (template_set_id, options_set_id) = match wire_format {
        WireFormat::Ipfix => (IPFIX_TEMPLATE_SET_ID, IPFIX_OPTIONS_SET_ID),
        _ => (V9_TEMPLATE_SET_ID, V9_OPTIONS_SET_ID),
    };

    let mut decoded = DecodedDatagram {
        format: Some(wire_format),
        ..DecodedDatagram::default()
    };

    while sets_region.len() >= SET_HEADER_BYTES {
        let set_id = BigEndian::read_u16(&sets_region[0..2]);
        let set_length = BigEndian::read_u16(&sets_region[2..4]) as usize;

        if set_length < SET_HEADER_BYTES || set_length > sets_region.len() {
            return Err(DecodeError::LengthViolation(format!(
                "set {} declares length {} with {} bytes remaining",
                set_id,
                set_length,
                sets_region.len()
            )));
        }

        let set_body = &sets_region[SET_HEADER_BYTES..set_length];

        if set_id == template_set_id {
            learn_templates(wire_format, set_body, observation_domain, template_cache)?;
        } else if set_id == options_set_id {
            // Plantillas de opciones: fuera del conjunto común, se omiten.
            decoded.skipped_sets += 1;
        } else if set_id >= FIRST_DATA_SET_ID {
            match template_cache.resolve(observation_domain, set_id) {
                Some(template) => {
                    project_data_set(template, set_body, export_timestamp, &mut decoded);
                }
                None => decoded.skipped_sets += 1,
            }
        } else {
            // Ids reservados (4..255): sin semántica asignada, se omiten.
            decoded.skipped_sets += 1;
        }

        sets_region = &sets_region[set_length..];
    }

    Ok(decoded)
}

/// Aprende todas las plantillas contenidas en un set de plantillas.
fn learn_templates(
    wire_format: WireFormat,
    mut template_region: &[u8],
    observation_domain: u32,
    template_cache: &mut TemplateCache,
) -> Result<(), DecodeError> {
    while template_region.len() >= 4 {
        let template_id = BigEndian::read_u16(&template_region[0..2]);
        let field_count = BigEndian::read_u16(&template_region[2..4]) as usize;
        template_region = &template_region[4..];

        if template_id < FIRST_DATA_SET_ID {
            return Err(DecodeError::TemplateMalformed(format!(
                "template id {} collides with reserved set ids",
                template_id
            )));
        }

        let mut field_specs = Vec::with_capacity(field_count);

        for _ in 0..field_count {
            if template_region.len() < 4 {
                return Err(DecodeError::TemplateMalformed(
                    "field specifier truncated".to_string(),
                ));
            }

            let raw_element_id = BigEndian::read_u16(&template_region[0..2]);
            let field_length = BigEndian::read_u16(&template_region[2..4]);
            template_region = &template_region[4..];

            // IPFIX: el bit alto marca un elemento de empresa privada con
            // 4 bytes adicionales de número de empresa.
            let is_enterprise =
                wire_format == WireFormat::Ipfix && raw_element_id & 0x8000 != 0;
            if is_enterprise {
                if template_region.len() < 4 {
                    return Err(DecodeError::TemplateMalformed(
                        "enterprise number truncated".to_string(),
                    ));
                }
                template_region = &template_region[4..];
            }

            field_specs.push(FieldSpec {
                element_id: raw_element_id & 0x7FFF,
                length: field_length,
                is_enterprise,
            });
        }

        if field_specs.is_empty() {
            // Retirada de plantilla (field_count 0): fuera del alcance, se ignora.
            continue;
        }

        template_cache.learn(
            observation_domain,
            TemplateRecord { template_id, fields: field_specs },
        );
    }

    Ok(())
}

/// Proyecta los registros de un set de datos sobre la forma canónica.
fn project_data_set(
    template: &TemplateRecord,
    mut data_region: &[u8],
    export_timestamp: f64,
    decoded: &mut DecodedDatagram,
) {
    let record_length = template.record_length();
    if record_length == 0 {
        decoded.skipped_sets += 1;
        return;
    }

    while data_region.len() >= record_length {
        let record_slice = &data_region[..record_length];
        data_region = &data_region[record_length..];

        match project_record(template, record_slice, export_timestamp) {
            Some(flow_record) => decoded.records.push(flow_record),
            None => decoded.faulted_records += 1,
        }
    }
    // El remanente menor que un registro completo es relleno del RFC.
}

/// Proyección de un registro de datos individual.
fn project_record(
    template: &TemplateRecord,
    record_slice: &[u8],
    export_timestamp: f64,
) -> Option<FlowRecord> {
    let mut source_address: Option<IpAddr> = None;
    let mut destination_address: Option<IpAddr> = None;
    let mut source_port: u16 = 0;
    let mut destination_port: u16 = 0;
    let mut protocol = TransportProtocol::Other(255);
    let mut byte_count: u64 = 0;
    let mut packet_count: u64 = 0;

    let mut field_offset = 0usize;

    for field in &template.fields {
        let field_length = field.length as usize;
        let field_bytes = &record_slice[field_offset..field_offset + field_length];
        field_offset += field_length;

        if field.is_enterprise {
            continue;
        }

        match field.element_id {
            IE_IN_BYTES => byte_count = read_unsigned(field_bytes),
            IE_IN_PKTS => packet_count = read_unsigned(field_bytes),
            IE_PROTOCOL => {
                protocol = TransportProtocol::from_iana(read_unsigned(field_bytes).min(255) as u8)
            }
            IE_L4_SRC_PORT => source_port = read_unsigned(field_bytes).min(u16::MAX as u64) as u16,
            IE_L4_DST_PORT => {
                destination_port = read_unsigned(field_bytes).min(u16::MAX as u64) as u16
            }
            IE_IPV4_SRC_ADDR if field_length == 4 => {
                source_address = Some(IpAddr::V4(Ipv4Addr::from(BigEndian::read_u32(field_bytes))));
            }
            IE_IPV4_DST_ADDR if field_length == 4 => {
                destination_address =
                    Some(IpAddr::V4(Ipv4Addr::from(BigEndian::read_u32(field_bytes))));
            }
            IE_IPV6_SRC_ADDR if field_length == 16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(field_bytes);
                source_address = Some(IpAddr::V6(Ipv6Addr::from(octets)));
            }
            IE_IPV6_DST_ADDR if field_length == 16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(field_bytes);
                destination_address = Some(IpAddr::V6(Ipv6Addr::from(octets)));
            }
            // Elemento fuera del conjunto común: consumido por longitud.
            _ => {}
        }
    }

    Some(FlowRecord {
        ts: export_timestamp,
        src_ip: source_address?,
        src_port: source_port,
        dst_ip: destination_address?,
        dst_port: destination_port,
        protocol,
        bytes: byte_count,
        packets: packet_count,
        service: None,
        app_hints: None,
    })
}

/// Lee un entero big-endian de longitud variable (1, 2, 4 u 8 bytes).
fn read_unsigned(field_bytes: &[u8]) -> u64 {
    let mut accumulator: u64 = 0;
    for byte in field_bytes.iter().take(8) {
        accumulator = (accumulator << 8) | *byte as u64;
    }
    accumulator
}
