// [apps/gateway/src/handlers/sources.rs]
/*!
 * =================================================================
 * APARATO: SOURCE ADMINISTRATION HANDLERS (V3.2)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CRUD DE FUENTES Y DRY-RUN DE ADMISIÓN
 * =================================================================
 */

use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use panoptes_domain_models::{ObservedOrigin, Source, SourceKind, SourceStatus};
use panoptes_infra_db::DbError;
use serde::Deserialize;
use serde_json::json;
use std::net::IpAddr;
use tracing::{info, instrument, warn};

/// Cuerpo de alta/mutación de una fuente.
#[derive(Debug, Deserialize)]
pub struct SourcePayload {
    pub id: String,
    pub tenant_id: String,
    pub display_name: String,
    #[serde(default = "default_kind")]
    pub declared_type: SourceKind,
    #[serde(default)]
    pub collector_label: Option<String>,
    #[serde(default = "default_status")]
    pub status: SourceStatus,
    #[serde(default)]
    pub allowed_ips: Vec<String>,
    #[serde(default)]
    pub max_eps: u32,
    #[serde(default)]
    pub block_on_exceed: bool,
}

fn default_kind() -> SourceKind {
    SourceKind::Http
}

fn default_status() -> SourceStatus {
    SourceStatus::Enabled
}

impl SourcePayload {
    fn into_source(self) -> Source {
        Source {
            id: self.id,
            tenant_id: self.tenant_id,
            display_name: self.display_name,
            declared_type: self.declared_type,
            observed_origin: ObservedOrigin::Unknown,
            collector_label: self.collector_label,
            status: self.status,
            allowed_ips: self.allowed_ips,
            max_eps: self.max_eps,
            block_on_exceed: self.block_on_exceed,
            last_seen: None,
        }
    }
}

/**
 * GET /v1/sources — listado completo del directorio.
 */
#[instrument(skip(state))]
pub async fn handle_list_sources(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.source_directory.list())
}

/**
 * GET /v1/sources/{id} — fuente individual.
 */
#[instrument(skip(state))]
pub async fn handle_get_source(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
) -> impl IntoResponse {
    match state.source_directory.resolve(&source_id) {
        Some(compiled) => (StatusCode::OK, Json(json!(compiled.snapshot()))).into_response(),
        None => source_not_found(),
    }
}

/**
 * POST /v1/sources — alta de fuente.
 */
#[instrument(skip(state, payload))]
pub async fn handle_create_source(
    State(state): State<AppState>,
    Json(payload): Json<SourcePayload>,
) -> impl IntoResponse {
    if payload.id.trim().is_empty() || payload.tenant_id.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "validation_failed", "detail": "id and tenant_id are mandatory" })),
        )
            .into_response();
    }

    let source = payload.into_source();
    let source_id = source.id.clone();

    match state.source_directory.upsert(source).await {
        Ok(()) => {
            info!("🗂️ [SOURCES]: Source {} registered.", source_id);
            (StatusCode::CREATED, Json(json!({ "id": source_id }))).into_response()
        }
        Err(persist_fault) => persistence_fault_response(persist_fault),
    }
}

/**
 * PUT /v1/sources/{id} — mutación completa de la fuente.
 */
#[instrument(skip(state, payload))]
pub async fn handle_update_source(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
    Json(mut payload): Json<SourcePayload>,
) -> impl IntoResponse {
    payload.id = source_id.clone();

    if state.source_directory.resolve(&source_id).is_none() {
        return source_not_found();
    }

    match state.source_directory.upsert(payload.into_source()).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "id": source_id }))).into_response(),
        Err(persist_fault) => persistence_fault_response(persist_fault),
    }
}

/**
 * DELETE /v1/sources/{id} — baja de la fuente.
 */
#[instrument(skip(state))]
pub async fn handle_delete_source(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
) -> impl IntoResponse {
    match state.source_directory.delete(&source_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(DbError::SourceNotFound) => source_not_found(),
        Err(persist_fault) => persistence_fault_response(persist_fault),
    }
}

/// Cuerpo del dry-run de admisión.
#[derive(Debug, Deserialize)]
pub struct AdmissionTestPayload {
    pub client_ip: String,
}

/**
 * POST /v1/sources/{id}/admission/test — veredicto sin mutación.
 */
#[instrument(skip(state, payload))]
pub async fn handle_admission_test(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
    Json(payload): Json<AdmissionTestPayload>,
) -> impl IntoResponse {
    let Ok(client_address) = payload.client_ip.trim().parse::<IpAddr>() else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "validation_failed", "detail": "unparseable client_ip" })),
        )
            .into_response();
    };

    match state.source_directory.probe(&source_id, client_address) {
        Some(probe_verdict) => (StatusCode::OK, Json(json!(probe_verdict))).into_response(),
        None => source_not_found(),
    }
}

fn source_not_found() -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "source_not_found" })),
    )
        .into_response()
}

fn persistence_fault_response(fault: DbError) -> axum::response::Response {
    warn!("💀 [SOURCES_FAULT]: {}", fault);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "fatal_internal" })),
    )
        .into_response()
}
