// [apps/gateway/src/handlers/system.rs]
/*!
 * =================================================================
 * APARATO: SYSTEM SURFACE HANDLERS (V3.1)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: LIVENESS, VERSIÓN, ESTADO GLOBAL Y SYNC DE FIREWALL
 * =================================================================
 */

use crate::state::source_directory::now_epoch_ms;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::{info, instrument};

/// Ventana de frescura del cabezal UDP para el veredicto de salud.
const UDP_FRESHNESS_WINDOW_MS: u64 = 60_000;

/**
 * GET /v1/health — sonda de liveness pública.
 */
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/**
 * GET /v1/version — versión del binario, pública.
 */
pub async fn handle_version() -> impl IntoResponse {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

/**
 * GET /v1/system — versiones, features y estado geo/UDP/export.
 */
#[instrument(skip(state))]
pub async fn handle_system_status(State(state): State<AppState>) -> impl IntoResponse {
    let geo_status = state.enrichment.geo().status();
    let threat_status = state.enrichment.intel().status();
    let (splunk_occupancy, elastic_occupancy) = state.pipeline.mailbox_occupancies();

    let dlq_depth = state.dlq_repository.count().await.unwrap_or(0);
    let now_ms = now_epoch_ms();

    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "features": {
            "sources": state.config.feature_sources,
            "udp_head": state.config.feature_udp_head,
        },
        "geo": geo_status,
        "threat_intel": threat_status,
        "udp_head": {
            "running": state.metrics.udp_head_running(now_ms, UDP_FRESHNESS_WINDOW_MS),
            "last_packet_epoch_ms": state.metrics.last_packet_epoch_ms(),
            "queue_depth": state.flow_queue.len(),
            "queue_capacity": state.flow_queue.capacity(),
        },
        "export": {
            "backpressure": state.metrics.backpressure_active(),
            "splunk_mailbox_occupancy": splunk_occupancy,
            "elastic_mailbox_occupancy": elastic_occupancy,
            "dlq_depth": dlq_depth,
        },
        "sources_cached": state.source_directory.len(),
        "uptime_ms": now_ms.saturating_sub(state.boot_epoch_ms),
    }))
}

/**
 * POST /v1/admin/security/sync-allowlist — entrega la unión de
 * allowlists habilitadas al puerto de firewall y devuelve los conteos.
 */
#[instrument(skip(state))]
pub async fn handle_allowlist_sync(State(state): State<AppState>) -> impl IntoResponse {
    let (contributing_sources, cidr_union) = state.source_directory.allowlist_union();
    let applied_block_count = state.firewall.apply_allowlist(&cidr_union);

    info!(
        "🧱 [ALLOWLIST_SYNC]: {} sources contributed {} CIDR blocks.",
        contributing_sources,
        cidr_union.len()
    );

    (
        StatusCode::OK,
        Json(json!({
            "sources": contributing_sources,
            "cidrs": cidr_union.len(),
            "adapter_cidrs": applied_block_count,
        })),
    )
}

/**
 * POST /v1/admin/enrichment/reload — disparo administrativo de la
 * recarga de bases geo y del snapshot de amenazas.
 */
#[instrument(skip(state))]
pub async fn handle_enrichment_reload(State(state): State<AppState>) -> impl IntoResponse {
    state.enrichment.geo().reload();

    match state.rebuild_threat_snapshot().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "reloaded": true }))).into_response(),
        Err(reload_fault) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "fatal_internal", "detail": reload_fault.to_string() })),
        )
            .into_response(),
    }
}
