/**
 * =================================================================
 * APARATO: ENRICHMENT LAWS TEST (V1.2)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-ENRICHMENT)
 * OBJETIVO: Certificar la idempotencia del enriquecimiento y el
 *           escenario canónico de extremo a extremo del dominio.
 * =================================================================
 */

use panoptes_domain_enrichment::{EnrichmentHub, GeoEngine, ThreatMatcher, ThreatSnapshot};
use panoptes_domain_models::record::{FlowRecord, TransportProtocol};

fn hub_fixture() -> EnrichmentHub {
    let threat_matcher =
        ThreatMatcher::new(ThreatSnapshot::from_lines("45.149.3.0/24\ndomain:evil.example\n".lines()));
    EnrichmentHub::new(GeoEngine::disabled(), threat_matcher)
}

fn canonical_flow() -> FlowRecord {
    FlowRecord {
        ts: 1_723_351_200.4,
        src_ip: "45.149.3.10".parse().unwrap(),
        src_port: 51_514,
        dst_ip: "8.8.8.8".parse().unwrap(),
        dst_port: 445,
        protocol: TransportProtocol::Tcp,
        bytes: 2_000_000,
        packets: 0,
        service: None,
        app_hints: None,
    }
}

#[test]
fn certify_canonical_end_to_end_verdict() {
    let hub = hub_fixture();
    let verdict = hub.enrich(&canonical_flow());

    // El origen en 45.149.3.0/24 dispara la coincidencia TI.
    assert_eq!(verdict.ti_matches, vec!["45.149.3.0/24".to_string()]);
    // 10 + 60 + 10 + 10 = 90, valor fijado por el contrato.
    assert_eq!(verdict.risk_score, 90);
    // Sin bases geo cargadas, ambos estratos degradan a null.
    assert!(verdict.geo.is_none());
    assert!(verdict.asn.is_none());
    println!("✅ ENRICH: canonical verdict certified (matches + score 90).");
}

#[test]
fn certify_enrichment_idempotence_by_field() {
    // Ley del contrato: enrich(enrich(r)) == enrich(r) campo a campo.
    let hub = hub_fixture();
    let flow = canonical_flow();

    let first_pass = hub.enrich(&flow);
    let second_pass = hub.enrich(&flow);

    assert_eq!(first_pass.ti_matches, second_pass.ti_matches);
    assert_eq!(first_pass.risk_score, second_pass.risk_score);
    assert_eq!(first_pass.geo, second_pass.geo);
    assert_eq!(first_pass.asn, second_pass.asn);
}

#[test]
fn certify_domain_hint_matching() {
    let hub = hub_fixture();

    let mut flow_with_hint = canonical_flow();
    flow_with_hint.src_ip = "10.0.0.1".parse().unwrap();
    flow_with_hint.app_hints = Some(serde_json::json!({ "host": "EVIL.example." }));

    let verdict = hub.enrich(&flow_with_hint);
    assert_eq!(verdict.ti_matches, vec!["evil.example".to_string()]);
    // Coincidencia TI sin puerto de riesgo extra: 10 + 60 + 10 (445) + 10 = 90.
    assert_eq!(verdict.risk_score, 90);
}

#[test]
fn certify_clean_record_baseline() {
    let hub = hub_fixture();

    let mut clean_flow = canonical_flow();
    clean_flow.src_ip = "192.0.2.1".parse().unwrap();
    clean_flow.dst_port = 443;
    clean_flow.bytes = 512;

    let verdict = hub.enrich(&clean_flow);
    assert!(verdict.ti_matches.is_empty());
    assert_eq!(verdict.risk_score, 10);
}
