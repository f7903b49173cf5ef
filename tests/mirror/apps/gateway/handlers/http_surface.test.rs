/**
 * =================================================================
 * APARATO: HTTP SURFACE INTEGRITY TEST (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-HANDLERS)
 * OBJETIVO: Certificar warming gate, formas laxas de autenticación,
 *           matriz de scopes, gzip de ingesta y estabilidad de ETag.
 * =================================================================
 */

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use flate2::write::GzEncoder;
use flate2::Compression;
use panoptes_gateway::prelude::*;
use serde_json::json;
use std::io::Write;
use tower::ServiceExt;

async fn gateway_fixture() -> (AppState, axum::Router) {
    let state = AppState::ignite(GatewayConfig::for_tests()).await.expect("state ignition failed");
    state.mark_ready();
    let router = create_gateway_router(state.clone());
    (state, router)
}

fn get_request(path: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(key) = api_key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
    }
    builder.body(Body::empty()).expect("request build failed")
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body read failed");
    serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null)
}

#[tokio::test]
async fn certify_public_probes() {
    let (_state, router) = gateway_fixture().await;

    let health_response =
        router.clone().oneshot(get_request("/v1/health", None)).await.expect("oneshot failed");
    assert_eq!(health_response.status(), StatusCode::OK);
    assert_eq!(body_json(health_response).await["status"], "ok");

    let version_response =
        router.oneshot(get_request("/v1/version", None)).await.expect("oneshot failed");
    assert_eq!(version_response.status(), StatusCode::OK);
    println!("✅ SURFACE: public probes certified.");
}

#[tokio::test]
async fn certify_warming_gate_returns_503() {
    // Estado SIN mark_ready: migraciones conceptualmente en curso.
    let state = AppState::ignite(GatewayConfig::for_tests()).await.expect("state ignition failed");
    let router = create_gateway_router(state);

    let gated_response = router
        .clone()
        .oneshot(get_request("/v1/metrics", Some("dev-user-key")))
        .await
        .expect("oneshot failed");
    assert_eq!(gated_response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(gated_response).await["error"], "warming_up");

    // Las sondas públicas atraviesan el warming.
    let health_response = router.oneshot(get_request("/v1/health", None)).await.expect("oneshot failed");
    assert_eq!(health_response.status(), StatusCode::OK);
    println!("✅ SURFACE: warming gate certified.");
}

#[tokio::test]
async fn certify_auth_and_scope_matrix() {
    let (_state, router) = gateway_fixture().await;

    // Sin credencial -> 401.
    let anonymous = router.clone().oneshot(get_request("/v1/metrics", None)).await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    // Clave desconocida -> 401.
    let unknown_key =
        router.clone().oneshot(get_request("/v1/metrics", Some("not-a-key"))).await.unwrap();
    assert_eq!(unknown_key.status(), StatusCode::UNAUTHORIZED);

    // Clave de usuario: lecturas sí, administración no.
    let user_metrics =
        router.clone().oneshot(get_request("/v1/metrics", Some("dev-user-key"))).await.unwrap();
    assert_eq!(user_metrics.status(), StatusCode::OK);

    let user_system =
        router.clone().oneshot(get_request("/v1/system", Some("dev-user-key"))).await.unwrap();
    assert_eq!(user_system.status(), StatusCode::FORBIDDEN, "clave conocida sin scope -> 403");

    // Clave admin: matriz completa.
    let admin_system =
        router.clone().oneshot(get_request("/v1/system", Some("dev-admin-key"))).await.unwrap();
    assert_eq!(admin_system.status(), StatusCode::OK);

    println!("✅ SURFACE: auth + scope matrix certified.");
}

#[tokio::test]
async fn certify_lenient_credential_forms() {
    let (_state, router) = gateway_fixture().await;

    // Forma 1: Authorization desnuda (sin 'Bearer').
    let bare_authorization = Request::builder()
        .method("GET")
        .uri("/v1/metrics")
        .header(header::AUTHORIZATION, "dev-user-key")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(bare_authorization).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Forma 2: X-API-Key.
    let api_key_header = Request::builder()
        .method("GET")
        .uri("/v1/metrics")
        .header("X-API-Key", "dev-user-key")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(api_key_header).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Forma 3: 'key=' en la query, SOLO para event-streams.
    let non_stream_query = Request::builder()
        .method("GET")
        .uri("/v1/metrics?key=dev-user-key")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(non_stream_query).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "query key vetada fuera de streams");

    let stream_query = Request::builder()
        .method("GET")
        .uri("/v1/logs/stream?key=dev-user-key")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(stream_query).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    println!("✅ SURFACE: lenient credential forms certified.");
}

#[tokio::test]
async fn certify_gzip_ingest_decompression() {
    let (state, router) = gateway_fixture().await;

    // Fuente abierta para el tránsito de la prueba.
    seed_open_source(&router).await;

    let envelope = json!({
        "collector_id": "t",
        "format": "flows.v1",
        "records": [{
            "ts": 1723351200.4, "src_ip": "10.0.0.1", "dst_ip": "8.8.8.8",
            "src_port": 40000, "dst_port": 443, "bytes": 128, "protocol": "tcp"
        }]
    });

    let mut gzip_encoder = GzEncoder::new(Vec::new(), Compression::default());
    gzip_encoder
        .write_all(envelope.to_string().as_bytes())
        .expect("gzip write failed");
    let compressed_body = gzip_encoder.finish().expect("gzip finish failed");

    let gzip_request = Request::builder()
        .method("POST")
        .uri("/v1/ingest")
        .header(header::AUTHORIZATION, "Bearer dev-user-key")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .header("x-forwarded-for", "203.0.113.10")
        .body(Body::from(compressed_body))
        .unwrap();

    let response = router.oneshot(gzip_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["accepted"], 1);
    assert_eq!(state.metrics.totals().records_processed, 1);

    println!("✅ SURFACE: gzip ingest decompression certified.");
}

#[tokio::test]
async fn certify_audit_etag_over_http() {
    let (_state, router) = gateway_fixture().await;
    seed_open_source(&router).await;

    // Dos consultas sin tráfico nuevo: ETag idéntico.
    let first_listing = router
        .clone()
        .oneshot(get_request("/v1/admin/requests?limit=50&window=15m", Some("dev-admin-key")))
        .await
        .unwrap();
    assert_eq!(first_listing.status(), StatusCode::OK);
    let first_etag = first_listing
        .headers()
        .get(header::ETAG)
        .and_then(|value| value.to_str().ok())
        .expect("ETag header missing")
        .to_string();

    let second_listing = router
        .clone()
        .oneshot(get_request("/v1/admin/requests?limit=50&window=15m", Some("dev-admin-key")))
        .await
        .unwrap();
    let second_etag = second_listing
        .headers()
        .get(header::ETAG)
        .and_then(|value| value.to_str().ok())
        .expect("ETag header missing")
        .to_string();
    assert_eq!(first_etag, second_etag, "sin peticiones nuevas el ETag es estable");

    // If-None-Match con la versión vigente -> 304.
    let conditional = Request::builder()
        .method("GET")
        .uri("/v1/admin/requests?limit=50&window=15m")
        .header(header::AUTHORIZATION, "Bearer dev-admin-key")
        .header(header::IF_NONE_MATCH, first_etag.clone())
        .body(Body::empty())
        .unwrap();
    let not_modified = router.clone().oneshot(conditional).await.unwrap();
    assert_eq!(not_modified.status(), StatusCode::NOT_MODIFIED);

    // Una petición nueva completada muta el ETag.
    let ingest_request = Request::builder()
        .method("POST")
        .uri("/v1/ingest")
        .header(header::AUTHORIZATION, "Bearer dev-user-key")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.10")
        .body(Body::from(
            json!({
                "collector_id": "t", "format": "flows.v1",
                "records": [{ "ts": 1.0, "src_ip": "10.0.0.1", "dst_ip": "10.0.0.2",
                              "src_port": 80, "dst_port": 443, "bytes": 1, "protocol": "tcp" }]
            })
            .to_string(),
        ))
        .unwrap();
    let ingest_response = router.clone().oneshot(ingest_request).await.unwrap();
    assert_eq!(ingest_response.status(), StatusCode::OK);

    let third_listing = router
        .oneshot(get_request("/v1/admin/requests?limit=50&window=15m", Some("dev-admin-key")))
        .await
        .unwrap();
    let third_etag = third_listing
        .headers()
        .get(header::ETAG)
        .and_then(|value| value.to_str().ok())
        .expect("ETag header missing")
        .to_string();
    assert_ne!(first_etag, third_etag, "la petición nueva debe mutar el ETag");

    println!("✅ SURFACE: HTTP-level ETag stability certified.");
}

#[tokio::test]
async fn certify_global_rpm_ceiling() {
    // Límite global por defecto de 60 rpm: cubo de 1 token/segundo.
    let mut throttled_config = GatewayConfig::for_tests();
    throttled_config.rate_limit_default_rpm = 60;

    let state = AppState::ignite(throttled_config).await.expect("state ignition failed");
    state.mark_ready();
    let router = create_gateway_router(state.clone());

    let first_read =
        router.clone().oneshot(get_request("/v1/metrics", Some("dev-user-key"))).await.unwrap();
    assert_eq!(first_read.status(), StatusCode::OK);

    // La segunda lectura del mismo segundo agota el presupuesto global.
    let second_read =
        router.clone().oneshot(get_request("/v1/metrics", Some("dev-user-key"))).await.unwrap();
    assert_eq!(second_read.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(second_read).await["reason"], "rate_limited:global");

    // Las sondas públicas quedan fuera del presupuesto.
    let health_read = router.oneshot(get_request("/v1/health", None)).await.unwrap();
    assert_eq!(health_read.status(), StatusCode::OK);
    assert!(state.metrics.totals().rate_limited_total >= 1);

    println!("✅ SURFACE: global RPM ceiling certified.");
}

/// Registra una fuente con allowlist total para las pruebas de tránsito.
async fn seed_open_source(router: &axum::Router) {
    let create_request = Request::builder()
        .method("POST")
        .uri("/v1/sources")
        .header(header::AUTHORIZATION, "Bearer dev-admin-key")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "id": "t",
                "tenant_id": "tenant-test",
                "display_name": "test source",
                "allowed_ips": ["0.0.0.0/0", "::/0"],
                "max_eps": 0,
                "block_on_exceed": false
            })
            .to_string(),
        ))
        .unwrap();

    let response = router.clone().oneshot(create_request).await.expect("source seed failed");
    assert_eq!(response.status(), StatusCode::CREATED);
}
