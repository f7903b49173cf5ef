// INICIO DEL ARCHIVO [apps/gateway/src/routes.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY ROUTING MATRIX (V4.4)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: TOPOLOGÍA COMPLETA DE LA SUPERFICIE /v1
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. STRATA GUARDS: Cada estrato de rutas porta su guardia de scope;
 *    la cadena exterior aplica warming, autenticación y el sobre de
 *    auditoría en ese orden.
 * 2. SIZE DISCIPLINE: El límite de 5 MiB se aplica al cuerpo ya
 *    descomprimido (la capa de límite es interior a la de gzip).
 * =================================================================
 */

use crate::handlers::{indicators, ingest, logs, lookup, metrics, outputs, requests, sources, system};
use crate::middleware::{audit_envelope, auth_guard, require_scope, warming_guard, Scope};
use crate::state::AppState;
use axum::{
    http::{header, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use panoptes_domain_models::ingest::MAX_PAYLOAD_BYTES;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::limit::RequestBodyLimitLayer;

pub fn create_gateway_router(application_shared_state: AppState) -> Router {
    // Escudo de red: CORS para el dashboard y herramientas de operación.
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // ESTRATO DE INGESTA (scope: ingest)
    let ingest_stratum = Router::new()
        .route("/ingest", post(ingest::handle_mixed_ingest))
        .route("/ingest/zeek", post(ingest::handle_zeek_ingest))
        .route("/ingest/netflow", post(ingest::handle_netflow_ingest))
        .route("/ingest/bulk", post(ingest::handle_bulk_ingest))
        .route_layer(middleware::from_fn(require_scope(Scope::Ingest)));

    // ESTRATO DE LECTURA DE MÉTRICAS (scope: read_metrics)
    let metrics_stratum = Router::new()
        .route("/lookup", post(lookup::handle_lookup))
        .route("/metrics", get(metrics::handle_metrics_snapshot))
        .route_layer(middleware::from_fn(require_scope(Scope::ReadMetrics)));

    // ESTRATO DE AUDITORÍA (scope: read_requests)
    let audit_stratum = Router::new()
        .route("/admin/requests", get(requests::handle_list_requests))
        .route("/admin/requests/stream", get(requests::handle_request_stream))
        .route("/admin/requests/:id", get(requests::handle_get_request))
        .route("/logs/stream", get(logs::handle_log_stream))
        .route_layer(middleware::from_fn(require_scope(Scope::ReadRequests)));

    // ESTRATO DE INDICADORES (scope: manage_indicators)
    let indicator_stratum = Router::new()
        .route(
            "/indicators",
            put(indicators::handle_upsert_indicator).get(indicators::handle_list_indicators),
        )
        .route("/indicators/:id", delete(indicators::handle_delete_indicator))
        .route_layer(middleware::from_fn(require_scope(Scope::ManageIndicators)));

    // ESTRATO DE EXPORTACIÓN (scope: export)
    let outputs_stratum = Router::new()
        .route("/outputs/test", post(outputs::handle_sink_probe))
        .route("/outputs/:target", post(outputs::handle_configure_sink))
        .route_layer(middleware::from_fn(require_scope(Scope::Export)));

    // ESTRATO ADMINISTRATIVO (scope: admin)
    let admin_stratum = Router::new()
        .route("/system", get(system::handle_system_status))
        .route("/sources", get(sources::handle_list_sources).post(sources::handle_create_source))
        .route(
            "/sources/:id",
            get(sources::handle_get_source)
                .put(sources::handle_update_source)
                .delete(sources::handle_delete_source),
        )
        .route("/sources/:id/admission/test", post(sources::handle_admission_test))
        .route("/admin/security/sync-allowlist", post(system::handle_allowlist_sync))
        .route("/admin/enrichment/reload", post(system::handle_enrichment_reload))
        .route_layer(middleware::from_fn(require_scope(Scope::Admin)));

    // COMPOSICIÓN PROTEGIDA: warming -> auth -> scope -> handler.
    let protected_surface = Router::new()
        .merge(ingest_stratum)
        .merge(metrics_stratum)
        .merge(audit_stratum)
        .merge(indicator_stratum)
        .merge(outputs_stratum)
        .merge(admin_stratum)
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), auth_guard))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), warming_guard));

    // TOPOLOGÍA GLOBAL
    Router::new()
        .nest(
            "/v1",
            Router::new()
                .route("/health", get(system::handle_health))
                .route("/version", get(system::handle_version))
                .merge(protected_surface),
        )
        // Cuerpo: límite de 5 MiB sobre el flujo YA descomprimido.
        .layer(RequestBodyLimitLayer::new(MAX_PAYLOAD_BYTES))
        .layer(RequestDecompressionLayer::new().gzip(true))
        // Sobre de auditoría: exactamente una entrada por petición.
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), audit_envelope))
        .layer(network_security_shield)
        .with_state(application_shared_state)
}
// FIN DEL ARCHIVO [apps/gateway/src/routes.rs]
