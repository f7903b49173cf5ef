/**
 * =================================================================
 * APARATO: IDEMPOTENCY LEDGER TEST (V2.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-DB)
 * OBJETIVO: Certificar la paridad byte a byte del replay, el alcance
 *           de la clave y la disciplina de poda TTL-primero.
 * =================================================================
 */

use chrono::{Duration, Utc};
use panoptes_infra_db::repositories::IdempotencyRepository;
use panoptes_infra_db::DbClient;

#[tokio::test]
async fn certify_byte_identical_replay() {
    let client = DbClient::connect(":memory:", None).await.expect("memory ledger ignition failed");
    let repository = IdempotencyRepository::new(client);
    let now = Utc::now();

    let original_body = r#"{"accepted":3,"rejected":0,"errors":[]}"#;
    repository
        .store("tenant-a", "/v1/ingest", "abc", 200, original_body, now + Duration::hours(24))
        .await
        .expect("store collapsed");

    let replayed = repository
        .fetch("tenant-a", "/v1/ingest", "abc", now)
        .await
        .expect("fetch collapsed")
        .expect("la clave vigente debe producir replay");

    // Ley del contrato: cuerpo y estado byte-idénticos dentro del TTL.
    assert_eq!(replayed.status, 200);
    assert_eq!(replayed.body, original_body);

    println!("✅ IDEMPOTENCY: byte-identical replay certified.");
}

#[tokio::test]
async fn certify_key_scoping_and_expiry() {
    let client = DbClient::connect(":memory:", None).await.expect("memory ledger ignition failed");
    let repository = IdempotencyRepository::new(client);
    let now = Utc::now();

    repository
        .store("tenant-a", "/v1/ingest", "abc", 200, "{}", now + Duration::hours(1))
        .await
        .expect("store collapsed");

    // Mismo client_key, endpoint distinto: sin colisión.
    assert!(repository
        .fetch("tenant-a", "/v1/ingest/zeek", "abc", now)
        .await
        .expect("fetch collapsed")
        .is_none());

    // Mismo client_key, tenant distinto: sin colisión.
    assert!(repository
        .fetch("tenant-b", "/v1/ingest", "abc", now)
        .await
        .expect("fetch collapsed")
        .is_none());

    // Entrada expirada: ausente aunque la poda no haya corrido.
    repository
        .store("tenant-a", "/v1/ingest", "stale", 200, "{}", now - Duration::seconds(5))
        .await
        .expect("store collapsed");
    assert!(repository
        .fetch("tenant-a", "/v1/ingest", "stale", now)
        .await
        .expect("fetch collapsed")
        .is_none());
}

#[tokio::test]
async fn certify_ttl_first_then_capacity_pruning() {
    // Decisión registrada del contrato: cuando TTL y cota dispararían en
    // la misma pasada, la edad se aplica primero y la cota solo desaloja
    // lo que sobrevive, por orden de inserción.
    let client = DbClient::connect(":memory:", None).await.expect("memory ledger ignition failed");
    let repository = IdempotencyRepository::new(client);
    let now = Utc::now();

    // 3 entradas expiradas + 5 vigentes insertadas en orden conocido.
    for stale_index in 0..3 {
        repository
            .store(
                "tenant-a",
                "/v1/ingest",
                &format!("stale-{}", stale_index),
                200,
                "{}",
                now - Duration::seconds(10),
            )
            .await
            .expect("store collapsed");
    }
    for live_index in 0..5 {
        repository
            .store(
                "tenant-a",
                "/v1/ingest",
                &format!("live-{}", live_index),
                200,
                "{}",
                now + Duration::hours(1),
            )
            .await
            .expect("store collapsed");
        // Separación temporal mínima para un orden de inserción estable.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let report = repository.prune(now, 3).await.expect("prune collapsed");

    assert_eq!(report.expired_removed, 3, "el TTL retira las tres expiradas");
    assert_eq!(report.capacity_removed, 2, "la cota desaloja 2 de las 5 vigentes");

    // Los supervivientes son los de inserción más reciente.
    assert!(repository.fetch("tenant-a", "/v1/ingest", "live-0", now).await.unwrap().is_none());
    assert!(repository.fetch("tenant-a", "/v1/ingest", "live-1", now).await.unwrap().is_none());
    assert!(repository.fetch("tenant-a", "/v1/ingest", "live-4", now).await.unwrap().is_some());

    println!("✅ IDEMPOTENCY: TTL-first pruning discipline certified.");
}
