// [apps/gateway/src/handlers/metrics.rs]
/*!
 * =================================================================
 * APARATO: METRICS SNAPSHOT HANDLER (V2.0)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: INSTANTÁNEA ESTRUCTURADA PARA EL OPERADOR
 * =================================================================
 */

use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use tracing::instrument;

/**
 * GET /v1/metrics — totales, promedios de 1 minuto, percentiles de
 * latencia, fuentes activas, contrapresión y series de 5 minutos.
 */
#[instrument(skip(state))]
pub async fn handle_metrics_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    let active_sources = state.source_directory.active_source_count();
    Json(state.metrics.snapshot(active_sources))
}
