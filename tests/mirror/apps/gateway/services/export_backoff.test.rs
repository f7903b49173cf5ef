/**
 * =================================================================
 * APARATO: EXPORT RESILIENCE TEST (V3.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L4-SERVICES)
 * OBJETIVO: Certificar la aritmética de retirada exponencial, los
 *           cuerpos de sink y la política de recencia del buzón.
 * =================================================================
 */

use panoptes_domain_models::record::{EnrichedRecord, FlowRecord, TransportProtocol};
use panoptes_gateway::services::export::{
    backoff_base_delay, backoff_with_jitter, build_elastic_body, build_splunk_body, ExportBatch,
    ExportMailbox, SubmitOutcome,
};
use std::time::Duration;

fn enriched_fixture() -> EnrichedRecord {
    EnrichedRecord::assemble(
        FlowRecord {
            ts: 1_723_351_200.4,
            src_ip: "45.149.3.10".parse().unwrap(),
            src_port: 51_514,
            dst_ip: "8.8.8.8".parse().unwrap(),
            dst_port: 445,
            protocol: TransportProtocol::Tcp,
            bytes: 2_000_000,
            packets: 150,
            service: None,
            app_hints: None,
        },
        None,
        None,
        vec!["45.149.3.0/24".to_string()],
        90,
    )
}

#[test]
fn certify_backoff_progression_and_cap() {
    // base 500 ms, factor 2, techo 30 s.
    assert_eq!(backoff_base_delay(0), Duration::from_millis(500));
    assert_eq!(backoff_base_delay(1), Duration::from_millis(1_000));
    assert_eq!(backoff_base_delay(2), Duration::from_millis(2_000));
    assert_eq!(backoff_base_delay(5), Duration::from_millis(16_000));
    assert_eq!(backoff_base_delay(6), Duration::from_millis(30_000), "el techo recorta 32 s a 30 s");
    assert_eq!(backoff_base_delay(20), Duration::from_millis(30_000));
    println!("✅ BACKOFF: exponential progression certified.");
}

#[test]
fn certify_jitter_stays_within_twenty_percent() {
    for attempt_index in 0..6 {
        let deterministic = backoff_base_delay(attempt_index).as_millis() as f64;
        for _ in 0..50 {
            let jittered = backoff_with_jitter(attempt_index).as_millis() as f64;
            assert!(
                jittered >= deterministic * 0.79 && jittered <= (deterministic * 1.21).min(30_000.0),
                "jitter fuera de banda: intento {} -> {} ms (base {} ms)",
                attempt_index,
                jittered,
                deterministic
            );
        }
    }
    println!("✅ BACKOFF: ±20% jitter band certified.");
}

#[test]
fn certify_splunk_body_shape() {
    let batch = ExportBatch::new("edge-01", vec![enriched_fixture(), enriched_fixture()]);
    let body = build_splunk_body(&batch);

    let event_lines: Vec<&str> = body.lines().collect();
    assert_eq!(event_lines.len(), 2, "un objeto evento por línea");

    let first_event: serde_json::Value = serde_json::from_str(event_lines[0]).expect("HEC line unparseable");
    assert_eq!(first_event["sourcetype"], "panoptes:flow");
    assert_eq!(first_event["source"], "edge-01");
    assert_eq!(first_event["fields"]["batch_id"], batch.batch_id);
    assert_eq!(first_event["event"]["risk_score"], 90);
    assert_eq!(first_event["event"]["ti"]["matches"][0], "45.149.3.0/24");
}

#[test]
fn certify_elastic_bulk_body_shape() {
    let record = enriched_fixture();
    let record_id = record.record_id.clone();
    let batch = ExportBatch::new("edge-01", vec![record]);
    let body = build_elastic_body(&batch);

    let ndjson_lines: Vec<&str> = body.lines().collect();
    assert_eq!(ndjson_lines.len(), 2, "acción + documento por registro");

    let action_line: serde_json::Value = serde_json::from_str(ndjson_lines[0]).expect("action unparseable");
    assert_eq!(action_line["index"]["_index"], "panoptes-flows");
    // El _id estable habilita la tolerancia de duplicados del sink.
    assert_eq!(action_line["index"]["_id"], record_id);

    let document_line: serde_json::Value =
        serde_json::from_str(ndjson_lines[1]).expect("document unparseable");
    assert_eq!(document_line["dst_port"], 445);
    assert_eq!(document_line["risk_score"], 90);
}

#[test]
fn certify_mailbox_recency_policy() {
    let mailbox = ExportMailbox::new(2);

    let first = ExportBatch::new("s", vec![enriched_fixture()]);
    let first_id = first.batch_id.clone();

    assert_eq!(mailbox.submit(first), SubmitOutcome::Stored);
    assert_eq!(mailbox.submit(ExportBatch::new("s", vec![enriched_fixture()])), SubmitOutcome::Stored);
    assert!((mailbox.occupancy() - 1.0).abs() < 1e-9);

    // Al 100%: el más viejo cede su lugar; el buzón preserva recencia.
    let third = ExportBatch::new("s", vec![enriched_fixture()]);
    let third_id = third.batch_id.clone();
    assert_eq!(mailbox.submit(third), SubmitOutcome::DroppedOldest);

    let drained = mailbox.drain();
    assert_eq!(drained.len(), 2);
    assert!(drained.iter().all(|batch| batch.batch_id != first_id));
    assert!(drained.iter().any(|batch| batch.batch_id == third_id));
    println!("✅ MAILBOX: recency eviction certified.");
}
