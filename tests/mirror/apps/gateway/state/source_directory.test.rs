/**
 * =================================================================
 * APARATO: SOURCE DIRECTORY ADMISSION TEST (V3.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L1-APP)
 * OBJETIVO: Certificar hidratación, veredictos del directorio, touch
 *           write-behind y la unión de allowlists.
 * =================================================================
 */

use panoptes_domain_models::{ObservedOrigin, Source, SourceKind, SourceStatus};
use panoptes_gateway::state::source_directory::{now_epoch_ms, DirectoryVerdict, SourceDirectory};
use panoptes_infra_db::repositories::SourceRepository;
use panoptes_infra_db::DbClient;

fn source_fixture(source_id: &str, allowed: Vec<&str>, max_eps: u32, block: bool) -> Source {
    Source {
        id: source_id.to_string(),
        tenant_id: "tenant-a".to_string(),
        display_name: format!("source {}", source_id),
        declared_type: SourceKind::Http,
        observed_origin: ObservedOrigin::Unknown,
        collector_label: None,
        status: SourceStatus::Enabled,
        allowed_ips: allowed.into_iter().map(String::from).collect(),
        max_eps,
        block_on_exceed: block,
        last_seen: None,
    }
}

async fn directory_fixture() -> SourceDirectory {
    let client = DbClient::connect(":memory:", None).await.expect("memory ledger ignition failed");
    SourceDirectory::new(SourceRepository::new(client))
}

#[tokio::test]
async fn certify_admit_and_deny_verdicts() {
    let directory = directory_fixture().await;
    directory
        .upsert(source_fixture("s1", vec!["10.0.0.0/24"], 0, false))
        .await
        .expect("upsert collapsed");

    // Cliente dentro de la allowlist: admitido con tenant resuelto.
    match directory.admit("s1", "10.0.0.9".parse().unwrap(), 5, ObservedOrigin::Http, now_epoch_ms()) {
        DirectoryVerdict::Admitted { tenant_id, over_cap } => {
            assert_eq!(tenant_id, "tenant-a");
            assert!(!over_cap);
        }
        _ => panic!("el cliente autorizado debe ser admitido"),
    }

    // Cliente fuera de la allowlist: razón exacta del contrato.
    match directory.admit("s1", "192.0.2.5".parse().unwrap(), 5, ObservedOrigin::Http, now_epoch_ms()) {
        DirectoryVerdict::Rejected { reason, rate_limited } => {
            assert_eq!(reason, "blocked:not_in_allowlist");
            assert!(!rate_limited);
        }
        _ => panic!("el cliente externo debe ser rechazado"),
    }

    // Fuente inexistente.
    assert!(matches!(
        directory.admit("ghost", "10.0.0.9".parse().unwrap(), 1, ObservedOrigin::Http, now_epoch_ms()),
        DirectoryVerdict::UnknownSource
    ));

    println!("✅ DIRECTORY: admission verdicts certified.");
}

#[tokio::test]
async fn certify_hydration_from_ledger() {
    let client = DbClient::connect(":memory:", None).await.expect("memory ledger ignition failed");
    let seeding_repository = SourceRepository::new(client.clone());

    seeding_repository
        .upsert_source(&source_fixture("persisted-a", vec!["10.0.0.0/8"], 100, true))
        .await
        .expect("seed collapsed");
    seeding_repository
        .upsert_source(&source_fixture("persisted-b", vec![], 0, false))
        .await
        .expect("seed collapsed");

    let directory = SourceDirectory::new(SourceRepository::new(client));
    let hydrated_count = directory.hydrate().await.expect("hydration collapsed");

    assert_eq!(hydrated_count, 2);
    assert_eq!(directory.len(), 2);

    // La fuente sin allowlist deniega todo por contrato.
    match directory.admit("persisted-b", "10.0.0.1".parse().unwrap(), 1, ObservedOrigin::Http, now_epoch_ms()) {
        DirectoryVerdict::Rejected { reason, .. } => assert_eq!(reason, "blocked:no_allowlist"),
        _ => panic!("allowlist vacía debe denegar"),
    }
}

#[tokio::test]
async fn certify_touch_flush_and_active_count() {
    let directory = directory_fixture().await;
    directory
        .upsert(source_fixture("seen", vec!["0.0.0.0/0"], 0, false))
        .await
        .expect("upsert collapsed");
    directory
        .upsert(source_fixture("silent", vec!["0.0.0.0/0"], 0, false))
        .await
        .expect("upsert collapsed");

    assert_eq!(directory.active_source_count(), 0);

    // Una admisión sella el touch pendiente; la fuente cuenta como activa.
    let _ = directory.admit("seen", "203.0.113.1".parse().unwrap(), 1, ObservedOrigin::Http, now_epoch_ms());
    assert_eq!(directory.active_source_count(), 1);

    // El volcado persiste y la actividad sobrevive al drenaje del buffer.
    let flushed = directory.flush_touches().await;
    assert_eq!(flushed, 1);
    assert_eq!(directory.active_source_count(), 1);

    let observed = directory.resolve("seen").expect("resolve collapsed").snapshot();
    assert!(observed.last_seen.is_some());
    assert_eq!(observed.observed_origin, ObservedOrigin::Http);

    println!("✅ DIRECTORY: write-behind touch certified.");
}

#[tokio::test]
async fn certify_allowlist_union_for_firewall_sync() {
    let directory = directory_fixture().await;
    directory
        .upsert(source_fixture("a", vec!["10.0.0.0/24", "10.0.1.0/24"], 0, false))
        .await
        .expect("upsert collapsed");
    directory
        .upsert(source_fixture("b", vec!["10.0.0.0/24", "192.0.2.0/24"], 0, false))
        .await
        .expect("upsert collapsed");

    // Fuente deshabilitada: excluida de la unión.
    let mut disabled = source_fixture("c", vec!["198.51.100.0/24"], 0, false);
    disabled.status = SourceStatus::Disabled;
    directory.upsert(disabled).await.expect("upsert collapsed");

    let (contributing_sources, cidr_union) = directory.allowlist_union();
    assert_eq!(contributing_sources, 2);
    assert_eq!(
        cidr_union,
        vec![
            "10.0.0.0/24".to_string(),
            "10.0.1.0/24".to_string(),
            "192.0.2.0/24".to_string()
        ],
        "unión deduplicada y ordenada, sin la fuente deshabilitada"
    );

    println!("✅ DIRECTORY: allowlist union certified.");
}
