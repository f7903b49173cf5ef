// [apps/gateway/src/handlers/indicators.rs]
/*!
 * =================================================================
 * APARATO: THREAT FEED MUTATION HANDLERS (V2.2)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ALTAS/BAJAS DE INDICADORES + SWAP DEL MATCHER
 * =================================================================
 */

use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use ipnetwork::IpNetwork;
use panoptes_domain_models::indicator::IndicatorKind;
use panoptes_infra_db::DbError;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

/// Cuerpo de alta de un indicador; el tipo se infiere si no viaja.
#[derive(Debug, Deserialize)]
pub struct IndicatorPayload {
    pub value: String,
    #[serde(default)]
    pub kind: Option<IndicatorKind>,
}

/**
 * PUT /v1/indicators — alta o refresco de un indicador del feed.
 * Tras la mutación el matcher se reconstruye y se instala por swap.
 */
#[instrument(skip(state, payload))]
pub async fn handle_upsert_indicator(
    State(state): State<AppState>,
    Json(payload): Json<IndicatorPayload>,
) -> impl IntoResponse {
    let normalized_value = payload.value.trim().to_string();
    if normalized_value.is_empty() {
        return validation_failure("empty indicator value");
    }

    // Inferencia del tipo: CIDR parseable o dominio.
    let indicator_kind = match payload.kind {
        Some(declared_kind) => declared_kind,
        None => {
            if normalized_value.parse::<IpNetwork>().is_ok() {
                IndicatorKind::Cidr
            } else {
                IndicatorKind::Domain
            }
        }
    };

    if indicator_kind == IndicatorKind::Cidr && normalized_value.parse::<IpNetwork>().is_err() {
        return validation_failure("unparseable CIDR indicator");
    }

    let stored_value = match indicator_kind {
        IndicatorKind::Domain => normalized_value.to_ascii_lowercase(),
        IndicatorKind::Cidr => normalized_value,
    };

    match state.indicator_repository.upsert_indicator(indicator_kind, &stored_value).await {
        Ok(stored_indicator) => {
            if let Err(rebuild_fault) = state.rebuild_threat_snapshot().await {
                warn!("⚠️ [THREAT_SWAP]: Rebuild after upsert failed: {}", rebuild_fault);
            }
            info!("🧬 [INDICATORS]: Indicator '{}' installed.", stored_indicator.value);
            (StatusCode::OK, Json(json!(stored_indicator))).into_response()
        }
        Err(persist_fault) => persistence_fault(persist_fault),
    }
}

/**
 * DELETE /v1/indicators/{id} — baja del indicador + swap del matcher.
 */
#[instrument(skip(state))]
pub async fn handle_delete_indicator(
    State(state): State<AppState>,
    Path(indicator_id): Path<String>,
) -> impl IntoResponse {
    match state.indicator_repository.delete_by_id(&indicator_id).await {
        Ok(()) => {
            if let Err(rebuild_fault) = state.rebuild_threat_snapshot().await {
                warn!("⚠️ [THREAT_SWAP]: Rebuild after delete failed: {}", rebuild_fault);
            }
            StatusCode::NO_CONTENT.into_response()
        }
        Err(DbError::IndicatorNotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "indicator_not_found" })),
        )
            .into_response(),
        Err(persist_fault) => persistence_fault(persist_fault),
    }
}

/**
 * GET /v1/indicators — listado del feed persistido.
 */
#[instrument(skip(state))]
pub async fn handle_list_indicators(State(state): State<AppState>) -> impl IntoResponse {
    match state.indicator_repository.fetch_all().await {
        Ok(indicators) => (StatusCode::OK, Json(json!(indicators))).into_response(),
        Err(persist_fault) => persistence_fault(persist_fault),
    }
}

fn validation_failure(detail: &str) -> axum::response::Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": "validation_failed", "detail": detail })),
    )
        .into_response()
}

fn persistence_fault(fault: DbError) -> axum::response::Response {
    warn!("💀 [INDICATORS_FAULT]: {}", fault);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "fatal_internal" })),
    )
        .into_response()
}
