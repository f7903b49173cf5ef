/**
 * =================================================================
 * APARATO: SOURCE REGISTRY LIFECYCLE TEST (V2.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-DB)
 * OBJETIVO: Certificar el ciclo CRUD de fuentes y el sellado write-behind
 *           de last_seen sobre el motor en memoria.
 * =================================================================
 */

use chrono::Utc;
use panoptes_domain_models::{ObservedOrigin, Source, SourceKind, SourceStatus};
use panoptes_infra_db::repositories::SourceRepository;
use panoptes_infra_db::{DbClient, DbError};

fn source_fixture(source_id: &str) -> Source {
    Source {
        id: source_id.to_string(),
        tenant_id: "tenant-a".to_string(),
        display_name: "edge collector".to_string(),
        declared_type: SourceKind::Http,
        observed_origin: ObservedOrigin::Unknown,
        collector_label: Some("dc1-rack4".to_string()),
        status: SourceStatus::Enabled,
        allowed_ips: vec!["10.0.0.0/24".to_string(), "2001:db8::/32".to_string()],
        max_eps: 500,
        block_on_exceed: true,
        last_seen: None,
    }
}

#[tokio::test]
async fn certify_source_crud_roundtrip() {
    let client = DbClient::connect(":memory:", None).await.expect("memory ledger ignition failed");
    let repository = SourceRepository::new(client);

    // 1. ALTA: la fuente se cristaliza con su allowlist JSON.
    repository.upsert_source(&source_fixture("s1")).await.expect("upsert collapsed");
    repository.upsert_source(&source_fixture("s2")).await.expect("upsert collapsed");

    let hydrated = repository.fetch_all().await.expect("hydration collapsed");
    assert_eq!(hydrated.len(), 2);

    let recovered = repository.fetch_by_id("s1").await.expect("fetch collapsed");
    assert_eq!(recovered.allowed_ips.len(), 2);
    assert_eq!(recovered.max_eps, 500);
    assert!(recovered.block_on_exceed);
    assert_eq!(recovered.status, SourceStatus::Enabled);
    assert_eq!(recovered.collector_label.as_deref(), Some("dc1-rack4"));

    // 2. MUTACIÓN: el upsert sobre el mismo id actualiza in situ.
    let mut mutated = source_fixture("s1");
    mutated.status = SourceStatus::Disabled;
    mutated.max_eps = 0;
    repository.upsert_source(&mutated).await.expect("mutation collapsed");

    let after_mutation = repository.fetch_by_id("s1").await.expect("fetch collapsed");
    assert_eq!(after_mutation.status, SourceStatus::Disabled);
    assert_eq!(after_mutation.max_eps, 0);
    assert_eq!(repository.fetch_all().await.unwrap().len(), 2, "el upsert no duplica");

    println!("✅ SOURCES: CRUD roundtrip certified.");
}

#[tokio::test]
async fn certify_last_seen_write_behind() {
    let client = DbClient::connect(":memory:", None).await.expect("memory ledger ignition failed");
    let repository = SourceRepository::new(client);

    repository.upsert_source(&source_fixture("s1")).await.expect("upsert collapsed");

    let observation_moment = Utc::now();
    repository
        .touch_last_seen("s1", observation_moment, ObservedOrigin::Udp)
        .await
        .expect("touch collapsed");

    let observed = repository.fetch_by_id("s1").await.expect("fetch collapsed");
    assert_eq!(observed.observed_origin, ObservedOrigin::Udp);
    let sealed_moment = observed.last_seen.expect("last_seen debe estar sellado");
    assert!((sealed_moment - observation_moment).num_seconds().abs() < 2);

    println!("✅ SOURCES: write-behind last_seen certified.");
}

#[tokio::test]
async fn certify_deletion_semantics() {
    let client = DbClient::connect(":memory:", None).await.expect("memory ledger ignition failed");
    let repository = SourceRepository::new(client);

    repository.upsert_source(&source_fixture("doomed")).await.expect("upsert collapsed");
    repository.delete_source("doomed").await.expect("delete collapsed");

    assert!(matches!(repository.fetch_by_id("doomed").await, Err(DbError::SourceNotFound)));
    assert!(matches!(repository.delete_source("doomed").await, Err(DbError::SourceNotFound)));
}
