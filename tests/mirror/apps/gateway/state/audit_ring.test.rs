/**
 * =================================================================
 * APARATO: AUDIT RING INTEGRITY TEST (V3.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L1-APP)
 * OBJETIVO: Certificar capacidad acotada, TTL, filtros, estabilidad
 *           del ETag y reanudación por secuencia.
 * =================================================================
 */

use chrono::{Duration, Utc};
use panoptes_gateway::state::audit_ring::{AuditQuery, AuditRing};
use panoptes_domain_models::audit::{AuditEntry, RequestResult};

fn entry_fixture(trace_id: &str, method: &str, path: &str, status: u16) -> AuditEntry {
    AuditEntry {
        trace_id: trace_id.to_string(),
        sequence: 0,
        timestamp: Utc::now(),
        method: method.to_string(),
        path: path.to_string(),
        status,
        duration_ms: 4,
        client_address: "10.0.0.9".to_string(),
        tenant_id: Some("default".to_string()),
        api_key_fingerprint: Some("dev…key".to_string()),
        bytes_in: 128,
        bytes_out: 64,
        result: RequestResult::from_status(status),
        timeline: Vec::new(),
        error: None,
        fitness: 1.0,
    }
}

#[test]
fn certify_bounded_capacity_evicts_head() {
    let ring = AuditRing::new(3, 3_600);

    for entry_index in 0..5 {
        ring.append(entry_fixture(&format!("t-{}", entry_index), "GET", "/v1/metrics", 200));
    }

    assert_eq!(ring.len(), 3, "la capacidad M gobierna el anillo");
    assert!(ring.get("t-0").is_none(), "la cabeza más vieja fue desalojada");
    assert!(ring.get("t-4").is_some());
    println!("✅ AUDIT_RING: bounded eviction certified.");
}

#[test]
fn certify_sequences_are_monotonic() {
    let ring = AuditRing::new(100, 3_600);

    let first = ring.append(entry_fixture("a", "GET", "/v1/metrics", 200));
    let second = ring.append(entry_fixture("b", "POST", "/v1/ingest", 200));
    let third = ring.append(entry_fixture("c", "POST", "/v1/ingest", 207));

    assert!(first.sequence < second.sequence && second.sequence < third.sequence);

    // Reanudación: todo lo posterior a la secuencia del primero.
    let resumed = ring.entries_after(first.sequence, 100);
    assert_eq!(resumed.len(), 2);
    assert_eq!(resumed[0].trace_id, "b");
    assert_eq!(resumed[1].trace_id, "c");
}

#[test]
fn certify_etag_stability_contract() {
    // Escenario del contrato: misma consulta dos veces sin tráfico nuevo
    // -> ETag idéntico; una petición nueva -> ETag distinto.
    let ring = AuditRing::new(100, 3_600);
    ring.append(entry_fixture("t-1", "POST", "/v1/ingest", 200));
    ring.append(entry_fixture("t-2", "POST", "/v1/ingest", 200));

    let window_query = AuditQuery { limit: 50, ..AuditQuery::default() };

    let first_page = ring.query(&window_query);
    let second_page = ring.query(&window_query);
    assert_eq!(first_page.etag, second_page.etag, "sin tráfico nuevo el ETag es estable");

    ring.append(entry_fixture("t-3", "POST", "/v1/ingest", 200));
    let third_page = ring.query(&window_query);
    assert_ne!(first_page.etag, third_page.etag, "una entrada nueva muta el ETag");

    println!("✅ AUDIT_RING: ETag stability certified.");
}

#[test]
fn certify_filters_and_pagination() {
    let ring = AuditRing::new(100, 3_600);
    ring.append(entry_fixture("g-1", "GET", "/v1/metrics", 200));
    ring.append(entry_fixture("p-1", "POST", "/v1/ingest", 207));
    ring.append(entry_fixture("p-2", "POST", "/v1/ingest", 429));
    ring.append(entry_fixture("p-3", "POST", "/v1/ingest/zeek", 200));
    ring.append(entry_fixture("h-1", "GET", "/v1/health", 200));

    // Método + clase de estado.
    let failed_posts = ring.query(&AuditQuery {
        method: Some("POST".to_string()),
        status_class: Some(4),
        ..AuditQuery::default()
    });
    assert_eq!(failed_posts.total_matching, 1);
    assert_eq!(failed_posts.entries[0].trace_id, "p-2");

    // Substring de ruta.
    let zeek_entries = ring.query(&AuditQuery {
        path_contains: Some("zeek".to_string()),
        ..AuditQuery::default()
    });
    assert_eq!(zeek_entries.total_matching, 1);

    // Exclusión de rutas de monitoreo.
    let operator_view = ring.query(&AuditQuery {
        exclude_monitoring_paths: true,
        ..AuditQuery::default()
    });
    assert_eq!(operator_view.total_matching, 3, "health y metrics quedan fuera");

    // Paginación: las más recientes primero.
    let first_page = ring.query(&AuditQuery { limit: 2, ..AuditQuery::default() });
    assert_eq!(first_page.entries.len(), 2);
    assert_eq!(first_page.entries[0].trace_id, "h-1");
    let second_page = ring.query(&AuditQuery { limit: 2, offset: 2, ..AuditQuery::default() });
    assert_eq!(second_page.entries[0].trace_id, "p-2");

    println!("✅ AUDIT_RING: filter matrix certified.");
}

#[test]
fn certify_ttl_pruning() {
    let ring = AuditRing::new(100, 60); // TTL de 60 s

    let mut stale_entry = entry_fixture("stale", "GET", "/v1/metrics", 200);
    stale_entry.timestamp = Utc::now() - Duration::seconds(120);
    ring.append(stale_entry);
    ring.append(entry_fixture("fresh", "GET", "/v1/metrics", 200));

    let pruned_count = ring.prune_expired(Utc::now());
    assert_eq!(pruned_count, 1);
    assert!(ring.get("stale").is_none());
    assert!(ring.get("fresh").is_some());
}
