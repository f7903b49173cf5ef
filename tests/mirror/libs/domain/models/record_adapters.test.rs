/**
 * =================================================================
 * APARATO: INGRESS ADAPTER INTEGRITY TEST (V2.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * OBJETIVO: Certificar la normalización Zeek/flows/NetFlow-JSON y el
 *           aislamiento de fallos por registro.
 * =================================================================
 */

use panoptes_domain_models::adapters::normalize_record;
use panoptes_domain_models::ingest::IngestFormat;
use panoptes_domain_models::record::TransportProtocol;
use serde_json::json;

#[test]
fn certify_flows_v1_normalization() {
    let raw_record = json!({
        "ts": 1723351200.4,
        "src_ip": "45.149.3.10",
        "dst_ip": "8.8.8.8",
        "src_port": 51514,
        "dst_port": 445,
        "bytes": 2000000,
        "protocol": "tcp"
    });

    let canonical = normalize_record(IngestFormat::FlowsV1, &raw_record)
        .expect("flows.v1 normalization collapsed");

    assert_eq!(canonical.dst_port, 445);
    assert_eq!(canonical.bytes, 2_000_000);
    assert_eq!(canonical.packets, 0, "packets ausentes deben degradar a 0");
    assert_eq!(canonical.protocol, TransportProtocol::Tcp);
    println!("✅ ADAPTERS: flows.v1 parity certified.");
}

#[test]
fn certify_zeek_conn_bidirectional_volumes() {
    // Escenario: Zeek reporta volúmenes por dirección; la forma canónica
    // transporta la suma de ambas.
    let raw_record = json!({
        "ts": 1723351201.25,
        "id.orig_h": "10.1.2.3",
        "id.orig_p": 54211,
        "id.resp_h": "2001:db8::99",
        "id.resp_p": 53,
        "proto": "udp",
        "service": "dns",
        "orig_bytes": 120,
        "resp_bytes": 480,
        "orig_pkts": 2,
        "resp_pkts": 2,
        "history": "Dd"
    });

    let canonical = normalize_record(IngestFormat::ZeekConnV1, &raw_record)
        .expect("zeek.conn.v1 normalization collapsed");

    assert_eq!(canonical.bytes, 600);
    assert_eq!(canonical.packets, 4);
    assert_eq!(canonical.service.as_deref(), Some("dns"));
    assert!(canonical.dst_ip.is_ipv6(), "el responder IPv6 debe sobrevivir");
    assert!(canonical.app_hints.is_some(), "la historia Zeek viaja como pista");
    println!("✅ ADAPTERS: zeek.conn.v1 parity certified.");
}

#[test]
fn certify_netflow_json_lenient_keys() {
    // Los exportadores v5 re-serializados usan claves legadas (srcaddr/dOctets).
    let raw_record = json!({
        "first": 1723351202.0,
        "srcaddr": "192.0.2.77",
        "dstaddr": "198.51.100.5",
        "srcport": 40001,
        "dstport": 3389,
        "prot": 6,
        "dOctets": 9000,
        "dPkts": 12
    });

    let canonical = normalize_record(IngestFormat::NetflowJson, &raw_record)
        .expect("netflow json normalization collapsed");

    assert_eq!(canonical.dst_port, 3389);
    assert_eq!(canonical.protocol, TransportProtocol::Tcp);
    assert_eq!(canonical.bytes, 9000);
    println!("✅ ADAPTERS: netflow legacy-key leniency certified.");
}

#[test]
fn certify_per_record_fault_isolation() {
    let malformed_record = json!({
        "ts": 1723351203.0,
        "src_ip": "not-an-address",
        "dst_ip": "8.8.8.8",
        "src_port": 1,
        "dst_port": 2,
        "protocol": "tcp"
    });

    let fault = normalize_record(IngestFormat::FlowsV1, &malformed_record)
        .expect_err("una dirección inválida debe producir motivo, no pánico");

    assert!(fault.contains("src_ip"), "el motivo debe nombrar el campo culpable");

    let port_overflow = json!({
        "ts": 1.0,
        "src_ip": "10.0.0.1",
        "dst_ip": "10.0.0.2",
        "src_port": 70000,
        "dst_port": 80,
        "protocol": "tcp"
    });

    assert!(normalize_record(IngestFormat::FlowsV1, &port_overflow).is_err());
    println!("✅ ADAPTERS: fault isolation certified.");
}
