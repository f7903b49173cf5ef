/**
 * =================================================================
 * APARATO: IDEMPOTENCY VAULT COORDINATION TEST (V3.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L1-APP)
 * OBJETIVO: Certificar replay, carrera de 'begin' concurrentes y la
 *           liberación de ranura ante cancelación del primario.
 * =================================================================
 */

use panoptes_gateway::state::idempotency_vault::{BeginOutcome, IdempotencyVault};
use panoptes_infra_db::repositories::IdempotencyRepository;
use panoptes_infra_db::DbClient;
use std::sync::Arc;
use std::time::Duration;

async fn vault_fixture() -> Arc<IdempotencyVault> {
    let client = DbClient::connect(":memory:", None).await.expect("memory ledger ignition failed");
    Arc::new(IdempotencyVault::new(
        IdempotencyRepository::new(client),
        86_400,
        1_000,
    ))
}

#[tokio::test]
async fn certify_fresh_commit_then_replay() {
    let vault = vault_fixture().await;

    // Primario: ejecuta y sella.
    let outcome = vault.begin("default", "/v1/ingest", "abc").await.expect("begin collapsed");
    let BeginOutcome::Fresh(guard) = outcome else {
        panic!("la primera llamada debe ser primaria");
    };

    let primary_body = r#"{"accepted":2,"rejected":0,"errors":[],"record_ids":["r1","r2"]}"#;
    vault.commit(guard, 200, primary_body).await.expect("commit collapsed");

    // Retry: replay byte-idéntico sin reentrar al pipeline.
    match vault.begin("default", "/v1/ingest", "abc").await.expect("begin collapsed") {
        BeginOutcome::Replay(stored) => {
            assert_eq!(stored.status, 200);
            assert_eq!(stored.body, primary_body);
        }
        BeginOutcome::Fresh(_) => panic!("el retry dentro del TTL debe producir replay"),
    }

    println!("✅ VAULT: fresh-commit-replay cycle certified.");
}

#[tokio::test]
async fn certify_concurrent_begin_waits_for_primary() {
    let vault = vault_fixture().await;

    let primary_outcome = vault.begin("default", "/v1/ingest", "race").await.expect("begin collapsed");
    let BeginOutcome::Fresh(primary_guard) = primary_outcome else {
        panic!("primer begin debe ser primario");
    };

    // Competidor: debe esperar al commit del primario y recibir replay.
    let competitor_vault = Arc::clone(&vault);
    let competitor_task = tokio::spawn(async move {
        competitor_vault.begin("default", "/v1/ingest", "race").await
    });

    // El primario trabaja un instante y sella.
    tokio::time::sleep(Duration::from_millis(50)).await;
    vault.commit(primary_guard, 200, r#"{"accepted":1}"#).await.expect("commit collapsed");

    match competitor_task.await.expect("competitor collapsed").expect("begin collapsed") {
        BeginOutcome::Replay(stored) => assert_eq!(stored.body, r#"{"accepted":1}"#),
        BeginOutcome::Fresh(_) => panic!("el competidor debió observar el replay del primario"),
    }

    println!("✅ VAULT: in-flight race coordination certified.");
}

#[tokio::test]
async fn certify_cancelled_primary_frees_the_slot() {
    let vault = vault_fixture().await;

    // Primario que muere sin commit (cancelación del handler).
    {
        let outcome = vault.begin("default", "/v1/ingest", "doomed").await.expect("begin collapsed");
        let BeginOutcome::Fresh(_abandoned_guard) = outcome else {
            panic!("primer begin debe ser primario");
        };
        // _abandoned_guard cae aquí: la ranura se libera sin caché negativa.
    }

    // El siguiente caller se vuelve primario, no esperante eterno.
    let retry_outcome = tokio::time::timeout(
        Duration::from_secs(2),
        vault.begin("default", "/v1/ingest", "doomed"),
    )
    .await
    .expect("el retry no debe colgarse")
    .expect("begin collapsed");

    assert!(matches!(retry_outcome, BeginOutcome::Fresh(_)));
    println!("✅ VAULT: cancellation slot release certified.");
}

#[tokio::test]
async fn certify_negative_results_use_short_ttl() {
    let vault = vault_fixture().await;

    let outcome = vault.begin("default", "/v1/ingest", "neg").await.expect("begin collapsed");
    let BeginOutcome::Fresh(guard) = outcome else { panic!("begin primario esperado") };

    // Fallo del servidor: memorizado con TTL corto (pero memorizado).
    vault.commit(guard, 503, r#"{"error":"warming_up"}"#).await.expect("commit collapsed");

    match vault.begin("default", "/v1/ingest", "neg").await.expect("begin collapsed") {
        BeginOutcome::Replay(stored) => assert_eq!(stored.status, 503),
        BeginOutcome::Fresh(_) => panic!("el resultado negativo vigente debe reproducirse"),
    }
}
