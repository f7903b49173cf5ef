// [apps/gateway/src/handlers/outputs.rs]
/*!
 * =================================================================
 * APARATO: SINK CONFIGURATION HANDLERS (V2.3)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CONFIGURACIÓN EN CALIENTE Y SONDA SINTÉTICA
 * =================================================================
 */

use crate::services::export::SinkConfig;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use panoptes_domain_models::SinkTarget;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Cuerpo de configuración de un sink.
#[derive(Debug, Deserialize)]
pub struct SinkConfigPayload {
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
}

fn parse_target(raw_target: &str) -> Option<SinkTarget> {
    match raw_target {
        "splunk" => Some(SinkTarget::Splunk),
        "elastic" => Some(SinkTarget::Elastic),
        _ => None,
    }
}

/**
 * POST /v1/outputs/{splunk|elastic} — reconfiguración en caliente.
 */
#[instrument(skip(state, payload))]
pub async fn handle_configure_sink(
    State(state): State<AppState>,
    Path(raw_target): Path<String>,
    Json(payload): Json<SinkConfigPayload>,
) -> impl IntoResponse {
    let Some(sink_target) = parse_target(&raw_target) else {
        return unknown_target_response(&raw_target);
    };

    if payload.url.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "validation_failed", "detail": "sink url is mandatory" })),
        )
            .into_response();
    }

    state.sink_router.configure(
        sink_target,
        SinkConfig {
            endpoint_url: Some(payload.url.trim().to_string()),
            auth_token: payload.token.filter(|token| !token.is_empty()),
        },
    );

    info!("🔧 [OUTPUTS]: {} sink reconfigured by operator.", sink_target.label());
    (StatusCode::OK, Json(json!({ "target": sink_target.label(), "configured": true }))).into_response()
}

/// Cuerpo de la sonda sintética.
#[derive(Debug, Deserialize)]
pub struct SinkProbePayload {
    pub target: String,
}

/**
 * POST /v1/outputs/test — sonda sintética contra el sink configurado.
 * Devuelve {target, ok, latency_ms, error?} y alimenta los contadores.
 */
#[instrument(skip(state, payload))]
pub async fn handle_sink_probe(
    State(state): State<AppState>,
    Json(payload): Json<SinkProbePayload>,
) -> impl IntoResponse {
    let Some(sink_target) = parse_target(&payload.target) else {
        return unknown_target_response(&payload.target);
    };

    let sink_config = state.sink_router.config_for(sink_target);
    let Some(endpoint_url) = sink_config.endpoint_url.clone() else {
        state.metrics.record_outputs_test(false);
        return (
            StatusCode::OK,
            Json(json!({
                "target": sink_target.label(),
                "ok": false,
                "latency_ms": 0,
                "error": "sink_unconfigured"
            })),
        )
            .into_response();
    };

    let probe_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .user_agent("Panoptes-Sink-Probe/2.3")
        .build();

    let Ok(probe_client) = probe_client else {
        state.metrics.record_outputs_test(false);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "fatal_internal" })),
        )
            .into_response();
    };

    let probe_started = Instant::now();
    let probe_result = probe_client.get(endpoint_url).send().await;
    let latency_ms = probe_started.elapsed().as_millis() as u64;

    match probe_result {
        Ok(probe_response) => {
            // Cualquier respuesta HTTP prueba que el enlace físico vive;
            // los códigos de auth cuentan como alcanzable.
            let link_alive = probe_response.status().as_u16() < 500;
            state.metrics.record_outputs_test(link_alive);

            (
                StatusCode::OK,
                Json(json!({
                    "target": sink_target.label(),
                    "ok": link_alive,
                    "latency_ms": latency_ms,
                    "error": if link_alive { serde_json::Value::Null } else {
                        json!(format!("HTTP {}", probe_response.status().as_u16()))
                    }
                })),
            )
                .into_response()
        }
        Err(probe_fault) => {
            warn!("⚠️ [SINK_PROBE]: {} unreachable: {}", sink_target.label(), probe_fault);
            state.metrics.record_outputs_test(false);
            (
                StatusCode::OK,
                Json(json!({
                    "target": sink_target.label(),
                    "ok": false,
                    "latency_ms": latency_ms,
                    "error": probe_fault.to_string()
                })),
            )
                .into_response()
        }
    }
}

fn unknown_target_response(raw_target: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "client_malformed", "detail": format!("unknown sink target: {}", raw_target) })),
    )
        .into_response()
}
