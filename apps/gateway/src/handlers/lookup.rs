// [apps/gateway/src/handlers/lookup.rs]
/*!
 * =================================================================
 * APARATO: ADDRESS LOOKUP HANDLER (V2.1)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ENRIQUECIMIENTO PUNTUAL DE UNA DIRECCIÓN
 * =================================================================
 */

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use std::net::IpAddr;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    /// Dirección a resolver; se acepta 'ip' o 'address'.
    #[serde(alias = "address")]
    pub ip: String,
}

/**
 * POST /v1/lookup — resuelve geo/ASN y coincidencias TI de una dirección.
 */
#[instrument(skip(state, request))]
pub async fn handle_lookup(
    State(state): State<AppState>,
    Json(request): Json<LookupRequest>,
) -> impl IntoResponse {
    let Ok(parsed_address) = request.ip.trim().parse::<IpAddr>() else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "validation_failed", "detail": "unparseable address" })),
        )
            .into_response();
    };

    let geo_answer = state.enrichment.geo().lookup(parsed_address);
    let ti_matches = state.enrichment.intel().match_ip(parsed_address);

    (
        StatusCode::OK,
        Json(json!({
            "address": parsed_address.to_string(),
            "geo": geo_answer.geo,
            "asn": geo_answer.asn,
            "ti": { "matches": ti_matches },
        })),
    )
        .into_response()
}
