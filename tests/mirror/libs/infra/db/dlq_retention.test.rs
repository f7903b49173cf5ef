/**
 * =================================================================
 * APARATO: DEAD-LETTER RETENTION TEST (V2.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-DB)
 * OBJETIVO: Certificar elegibilidad de replay, sellado de reintentos
 *           y purga por horizonte de retención.
 * =================================================================
 */

use chrono::{Duration, Utc};
use panoptes_domain_models::{DlqEntry, SinkTarget};
use panoptes_infra_db::repositories::DlqRepository;
use panoptes_infra_db::DbClient;

fn dlq_fixture(entry_id: &str, destination: SinkTarget, eligible_in_seconds: i64) -> DlqEntry {
    let now = Utc::now();
    DlqEntry {
        id: entry_id.to_string(),
        destination,
        payload: serde_json::json!({ "batch_id": entry_id, "records": [{"bytes": 10}] }),
        first_attempt_at: now,
        last_attempt_at: now,
        attempts: 3,
        next_eligible_at: now + Duration::seconds(eligible_in_seconds),
        last_error: "HTTP 503".to_string(),
    }
}

#[tokio::test]
async fn certify_eligibility_window() {
    let client = DbClient::connect(":memory:", None).await.expect("memory ledger ignition failed");
    let repository = DlqRepository::new(client);
    let now = Utc::now();

    repository.append(&dlq_fixture("ready-1", SinkTarget::Splunk, -30)).await.expect("append collapsed");
    repository.append(&dlq_fixture("ready-2", SinkTarget::Elastic, -10)).await.expect("append collapsed");
    repository.append(&dlq_fixture("deferred", SinkTarget::Splunk, 300)).await.expect("append collapsed");

    let eligible = repository.fetch_eligible(now, 10).await.expect("fetch collapsed");
    let eligible_ids: Vec<&str> = eligible.iter().map(|entry| entry.id.as_str()).collect();

    assert_eq!(eligible_ids, vec!["ready-1", "ready-2"], "orden por elegibilidad ascendente");
    assert_eq!(eligible[0].attempts, 3);
    assert_eq!(eligible[0].last_error, "HTTP 503");
    assert_eq!(repository.count().await.unwrap(), 3);

    println!("✅ DLQ: eligibility window certified.");
}

#[tokio::test]
async fn certify_failed_attempt_reschedule_and_release() {
    let client = DbClient::connect(":memory:", None).await.expect("memory ledger ignition failed");
    let repository = DlqRepository::new(client);
    let now = Utc::now();

    repository.append(&dlq_fixture("batch-x", SinkTarget::Splunk, -5)).await.expect("append collapsed");

    // Reintento fallido: attempts avanza y la elegibilidad se difiere.
    repository
        .record_failed_attempt("batch-x", now, now + Duration::seconds(60), "HTTP 502")
        .await
        .expect("reschedule collapsed");

    assert!(repository.fetch_eligible(now, 10).await.unwrap().is_empty());

    let deferred = repository
        .fetch_eligible(now + Duration::seconds(61), 10)
        .await
        .expect("fetch collapsed");
    assert_eq!(deferred.len(), 1);
    assert_eq!(deferred[0].attempts, 4);
    assert_eq!(deferred[0].last_error, "HTTP 502");

    // Entrega exitosa durante el replay: el lote se libera.
    repository.remove("batch-x").await.expect("release collapsed");
    assert_eq!(repository.count().await.unwrap(), 0);

    println!("✅ DLQ: reschedule + release certified.");
}

#[tokio::test]
async fn certify_retention_horizon_purge() {
    let client = DbClient::connect(":memory:", None).await.expect("memory ledger ignition failed");
    let repository = DlqRepository::new(client);
    let now = Utc::now();

    // Lote antiguo: primer intento hace 8 días (retención por defecto 7d).
    let mut ancient_entry = dlq_fixture("ancient", SinkTarget::Elastic, -10);
    ancient_entry.first_attempt_at = now - Duration::days(8);
    repository.append(&ancient_entry).await.expect("append collapsed");

    // Lote reciente: debe sobrevivir a la compactación.
    repository.append(&dlq_fixture("fresh", SinkTarget::Splunk, -10)).await.expect("append collapsed");

    let purged = repository
        .purge_expired(now, 7 * 24 * 3600)
        .await
        .expect("purge collapsed");

    assert_eq!(purged, 1, "solo el lote más allá del horizonte se purga");

    let survivors = repository.fetch_eligible(now, 10).await.expect("fetch collapsed");
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].id, "fresh");

    println!("✅ DLQ: retention horizon purge certified.");
}
