/**
 * =================================================================
 * APARATO: NETFLOW V5 DECODE INTEGRITY TEST (V2.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-NETFLOW)
 * OBJETIVO: Certificar la decodificación del layout fijo y el rechazo
 *           de datagramas truncados o de versión desconocida.
 * =================================================================
 */

use panoptes_domain_models::record::TransportProtocol;
use panoptes_infra_netflow::{DatagramDecoder, DecodeError, WireFormat};

fn push_u16(buffer: &mut Vec<u8>, value: u16) {
    buffer.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(buffer: &mut Vec<u8>, value: u32) {
    buffer.extend_from_slice(&value.to_be_bytes());
}

/// Construye un datagrama v5 con dos registros conocidos.
fn v5_fixture() -> Vec<u8> {
    let mut datagram = Vec::new();

    // --- CABECERA (24 bytes) ---
    push_u16(&mut datagram, 5); // version
    push_u16(&mut datagram, 2); // count
    push_u32(&mut datagram, 123_456); // sys_uptime
    push_u32(&mut datagram, 1_723_351_200); // unix_secs
    push_u32(&mut datagram, 500_000_000); // unix_nsecs
    push_u32(&mut datagram, 42); // flow_sequence
    datagram.push(0); // engine_type
    datagram.push(0); // engine_id
    push_u16(&mut datagram, 0); // sampling_interval

    // --- REGISTRO 1: TCP 10.0.0.1:51514 -> 45.149.3.10:445 ---
    push_u32(&mut datagram, u32::from_be_bytes([10, 0, 0, 1])); // srcaddr
    push_u32(&mut datagram, u32::from_be_bytes([45, 149, 3, 10])); // dstaddr
    push_u32(&mut datagram, 0); // nexthop
    push_u16(&mut datagram, 1); // input
    push_u16(&mut datagram, 2); // output
    push_u32(&mut datagram, 150); // dPkts
    push_u32(&mut datagram, 2_000_000); // dOctets
    push_u32(&mut datagram, 1000); // first
    push_u32(&mut datagram, 2000); // last
    push_u16(&mut datagram, 51_514); // srcport
    push_u16(&mut datagram, 445); // dstport
    datagram.push(0); // pad1
    datagram.push(0x18); // tcp_flags
    datagram.push(6); // prot (TCP)
    datagram.push(0); // tos
    push_u16(&mut datagram, 64_500); // src_as
    push_u16(&mut datagram, 15_169); // dst_as
    datagram.push(24); // src_mask
    datagram.push(24); // dst_mask
    push_u16(&mut datagram, 0); // pad2

    // --- REGISTRO 2: UDP 192.0.2.9:53 -> 198.51.100.4:53 ---
    push_u32(&mut datagram, u32::from_be_bytes([192, 0, 2, 9]));
    push_u32(&mut datagram, u32::from_be_bytes([198, 51, 100, 4]));
    push_u32(&mut datagram, 0);
    push_u16(&mut datagram, 1);
    push_u16(&mut datagram, 2);
    push_u32(&mut datagram, 4);
    push_u32(&mut datagram, 512);
    push_u32(&mut datagram, 1000);
    push_u32(&mut datagram, 1500);
    push_u16(&mut datagram, 53);
    push_u16(&mut datagram, 53);
    datagram.push(0);
    datagram.push(0);
    datagram.push(17); // prot (UDP)
    datagram.push(0);
    push_u16(&mut datagram, 0);
    push_u16(&mut datagram, 0);
    datagram.push(32);
    datagram.push(32);
    push_u16(&mut datagram, 0);

    datagram
}

#[test]
fn certify_v5_fixed_layout_decode() {
    let mut decoder = DatagramDecoder::new();
    let decoded = decoder.decode(&v5_fixture()).expect("v5 decode collapsed");

    assert_eq!(decoded.format, Some(WireFormat::V5));
    assert_eq!(decoded.records.len(), 2);

    let first_record = &decoded.records[0];
    assert_eq!(first_record.src_ip.to_string(), "10.0.0.1");
    assert_eq!(first_record.dst_ip.to_string(), "45.149.3.10");
    assert_eq!(first_record.src_port, 51_514);
    assert_eq!(first_record.dst_port, 445);
    assert_eq!(first_record.protocol, TransportProtocol::Tcp);
    assert_eq!(first_record.bytes, 2_000_000);
    assert_eq!(first_record.packets, 150);
    // Marca de tiempo de exportación: unix_secs + nsecs.
    assert!((first_record.ts - 1_723_351_200.5).abs() < 1e-6);

    let second_record = &decoded.records[1];
    assert_eq!(second_record.protocol, TransportProtocol::Udp);
    assert_eq!(second_record.bytes, 512);

    println!("✅ NETFLOW_V5: fixed layout parity certified.");
}

#[test]
fn certify_truncated_and_unknown_rejections() {
    let mut decoder = DatagramDecoder::new();

    // Datagrama de 1 byte: ni siquiera alcanza la palabra de versión.
    assert!(matches!(
        decoder.decode(&[0x00]),
        Err(DecodeError::Truncated { .. })
    ));

    // Versión inexistente (7).
    assert_eq!(
        decoder.decode(&[0x00, 0x07, 0x00, 0x00]),
        Err(DecodeError::UnknownVersion(7))
    );

    // Cabecera v5 que declara más registros de los que transporta.
    let mut short_datagram = v5_fixture();
    short_datagram.truncate(30);
    assert!(matches!(
        decoder.decode(&short_datagram),
        Err(DecodeError::Truncated { .. })
    ));

    // El conteo v5 jamás supera 30 registros por contrato de protocolo.
    let mut inflated_datagram = v5_fixture();
    inflated_datagram[2] = 0x00;
    inflated_datagram[3] = 0xFF;
    assert!(matches!(
        decoder.decode(&inflated_datagram),
        Err(DecodeError::LengthViolation(_))
    ));

    println!("✅ NETFLOW_V5: rejection strata certified.");
}
