// [libs/domain/models/src/adapters.rs]
/*!
 * =================================================================
 * APARATO: INGRESS FORMAT ADAPTERS (V3.0 - EDGE NORMALIZATION)
 * CLASIFICACIÓN: DOMAIN ADAPTERS (ESTRATO L2)
 * RESPONSABILIDAD: NORMALIZACIÓN DE FORMATOS EXTERNOS A LA FORMA CANÓNICA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. EDGE DISCIPLINE: Toda conversión ocurre aquí, en el borde; el
 *    pipeline solo conoce la forma canónica.
 * 2. FAULT ISOLATION: Un registro malformado produce un motivo textual,
 *    jamás aborta el lote que lo contiene.
 * 3. LENIENT KEYS: El adaptador NetFlow-JSON acepta las variantes de
 *    nombre de campo de exportadores v5/v9 comunes.
 * =================================================================
 */

use crate::ingest::IngestFormat;
use crate::record::{FlowRecord, TransportProtocol};
use serde_json::Value;
use std::net::IpAddr;

/**
 * Normaliza un registro crudo del formato declarado a la forma canónica.
 */
pub fn normalize_record(format: IngestFormat, raw_record: &Value) -> Result<FlowRecord, String> {
    match format {
        IngestFormat::FlowsV1 => normalize_flows_v1(raw_record),
        IngestFormat::ZeekConnV1 => normalize_zeek_conn(raw_record),
        IngestFormat::NetflowJson => normalize_netflow_json(raw_record),
    }
}

/// Adaptador del formato genérico 'flows.v1'.
fn normalize_flows_v1(raw_record: &Value) -> Result<FlowRecord, String> {
    let record_object = raw_record
        .as_object()
        .ok_or_else(|| "record is not an object".to_string())?;

    Ok(FlowRecord {
        ts: read_f64(record_object, &["ts", "timestamp"]).ok_or("missing field: ts")?,
        src_ip: read_ip(record_object, &["src_ip"])?,
        src_port: read_port(record_object, &["src_port"])?,
        dst_ip: read_ip(record_object, &["dst_ip"])?,
        dst_port: read_port(record_object, &["dst_port"])?,
        protocol: read_protocol(record_object, &["protocol", "proto"]),
        bytes: read_u64(record_object, &["bytes"]).unwrap_or(0),
        packets: read_u64(record_object, &["packets"]).unwrap_or(0),
        service: read_string(record_object, &["service"]),
        app_hints: record_object.get("app_hints").cloned(),
    })
}

/// Adaptador de líneas JSON de Zeek conn.log.
/// Los volúmenes canónicos suman ambas direcciones de la conexión.
fn normalize_zeek_conn(raw_record: &Value) -> Result<FlowRecord, String> {
    let record_object = raw_record
        .as_object()
        .ok_or_else(|| "record is not an object".to_string())?;

    let originator_bytes = read_u64(record_object, &["orig_bytes"]).unwrap_or(0);
    let responder_bytes = read_u64(record_object, &["resp_bytes"]).unwrap_or(0);
    let originator_packets = read_u64(record_object, &["orig_pkts"]).unwrap_or(0);
    let responder_packets = read_u64(record_object, &["resp_pkts"]).unwrap_or(0);

    Ok(FlowRecord {
        ts: read_f64(record_object, &["ts"]).ok_or("missing field: ts")?,
        src_ip: read_ip(record_object, &["id.orig_h"])?,
        src_port: read_port(record_object, &["id.orig_p"])?,
        dst_ip: read_ip(record_object, &["id.resp_h"])?,
        dst_port: read_port(record_object, &["id.resp_p"])?,
        protocol: read_protocol(record_object, &["proto"]),
        bytes: originator_bytes + responder_bytes,
        packets: originator_packets + responder_packets,
        service: read_string(record_object, &["service"]),
        app_hints: record_object.get("history").map(|history_value| {
            serde_json::json!({ "zeek_history": history_value })
        }),
    })
}

/// Adaptador de registros NetFlow/IPFIX re-serializados a JSON.
fn normalize_netflow_json(raw_record: &Value) -> Result<FlowRecord, String> {
    let record_object = raw_record
        .as_object()
        .ok_or_else(|| "record is not an object".to_string())?;

    Ok(FlowRecord {
        ts: read_f64(record_object, &["ts", "timestamp", "first"]).ok_or("missing field: ts")?,
        src_ip: read_ip(record_object, &["src_ip", "src_addr", "srcaddr"])?,
        src_port: read_port(record_object, &["src_port", "srcport"])?,
        dst_ip: read_ip(record_object, &["dst_ip", "dst_addr", "dstaddr"])?,
        dst_port: read_port(record_object, &["dst_port", "dstport"])?,
        protocol: read_protocol(record_object, &["protocol", "prot", "proto"]),
        bytes: read_u64(record_object, &["bytes", "in_bytes", "dOctets"]).unwrap_or(0),
        packets: read_u64(record_object, &["packets", "in_pkts", "dPkts"]).unwrap_or(0),
        service: None,
        app_hints: None,
    })
}

// --- LECTORES DE CAMPO LAXOS ---

fn first_present<'a>(
    record_object: &'a serde_json::Map<String, Value>,
    candidate_keys: &[&str],
) -> Option<&'a Value> {
    candidate_keys.iter().find_map(|key| record_object.get(*key))
}

fn read_f64(record_object: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<f64> {
    first_present(record_object, keys).and_then(|value| match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.parse::<f64>().ok(),
        _ => None,
    })
}

fn read_u64(record_object: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<u64> {
    first_present(record_object, keys).and_then(|value| match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.parse::<u64>().ok(),
        _ => None,
    })
}

fn read_string(record_object: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_present(record_object, keys)
        .and_then(|value| value.as_str())
        .map(|text| text.to_string())
}

fn read_ip(
    record_object: &serde_json::Map<String, Value>,
    keys: &[&str],
) -> Result<IpAddr, String> {
    let raw_value = first_present(record_object, keys)
        .and_then(|value| value.as_str())
        .ok_or_else(|| format!("missing field: {}", keys[0]))?;

    raw_value
        .parse::<IpAddr>()
        .map_err(|_| format!("invalid address in field {}: {}", keys[0], raw_value))
}

fn read_port(
    record_object: &serde_json::Map<String, Value>,
    keys: &[&str],
) -> Result<u16, String> {
    let raw_port = read_u64(record_object, keys)
        .ok_or_else(|| format!("missing field: {}", keys[0]))?;

    u16::try_from(raw_port).map_err(|_| format!("port out of range in field {}: {}", keys[0], raw_port))
}

fn read_protocol(
    record_object: &serde_json::Map<String, Value>,
    keys: &[&str],
) -> TransportProtocol {
    match first_present(record_object, keys) {
        Some(Value::String(label)) => TransportProtocol::parse_label(label),
        Some(Value::Number(number)) => {
            TransportProtocol::from_iana(number.as_u64().unwrap_or(255).min(255) as u8)
        }
        _ => TransportProtocol::Other(255),
    }
}
