// [apps/gateway/src/handlers/ingest.rs]
/*!
 * =================================================================
 * APARATO: INGEST SURFACE HANDLERS (V4.5 - ADMISSION + IDEMPOTENCY)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: LOTES HTTP -> ADMISIÓN -> DEDUP -> PIPELINE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ENVELOPE TRIAD: Sobre mixto con formato declarado, endpoints
 *    dedicados Zeek/NetFlow y bulk con tipo explícito.
 * 2. MULTI-STATUS: Registros malformados viajan en 'errors[]' con
 *    semántica 207; el lote completo solo muere con sobre ilegible.
 * 3. BYTE PARITY: El replay idempotente devuelve el cuerpo y estado
 *    exactos de la petición primaria.
 * =================================================================
 */

use crate::middleware::{AuthContext, ResultOverride, TimelineRecorder};
use crate::state::source_directory::{now_epoch_ms, DirectoryVerdict, SourceDirectory};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use panoptes_domain_models::audit::{RequestResult, TimelineStage};
use panoptes_domain_models::ingest::MAX_BATCH_RECORDS;
use panoptes_domain_models::{IngestFormat, IngestRequestEnvelope, ObservedOrigin};
use serde_json::{json, Value};
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, instrument, warn};

/// Cabecera de idempotencia del contrato.
const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/**
 * POST /v1/ingest — sobre mixto con formato declarado.
 */
#[instrument(skip_all)]
pub async fn handle_mixed_ingest(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Extension(timeline): Extension<TimelineRecorder>,
    Extension(auth_context): Extension<AuthContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let envelope: IngestRequestEnvelope = match serde_json::from_slice(&body) {
        Ok(parsed_envelope) => parsed_envelope,
        Err(parse_fault) => return malformed_envelope_response(&parse_fault.to_string()),
    };

    let Some(declared_format) = IngestFormat::parse(&envelope.format) else {
        return malformed_envelope_response(&format!("unknown format: {}", envelope.format));
    };

    ingest_core(
        state,
        timeline,
        auth_context,
        headers,
        connect_info,
        "/v1/ingest",
        envelope.collector_id,
        declared_format,
        envelope.records,
    )
    .await
}

/**
 * POST /v1/ingest/zeek — líneas JSON de conn.log.
 */
#[instrument(skip_all)]
pub async fn handle_zeek_ingest(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Extension(timeline): Extension<TimelineRecorder>,
    Extension(auth_context): Extension<AuthContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dedicated_format_ingest(
        state,
        timeline,
        auth_context,
        headers,
        connect_info,
        "/v1/ingest/zeek",
        IngestFormat::ZeekConnV1,
        "zeek",
        body,
    )
    .await
}

/**
 * POST /v1/ingest/netflow — registros NetFlow/IPFIX re-serializados.
 */
#[instrument(skip_all)]
pub async fn handle_netflow_ingest(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Extension(timeline): Extension<TimelineRecorder>,
    Extension(auth_context): Extension<AuthContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dedicated_format_ingest(
        state,
        timeline,
        auth_context,
        headers,
        connect_info,
        "/v1/ingest/netflow",
        IngestFormat::NetflowJson,
        "netflow",
        body,
    )
    .await
}

/**
 * POST /v1/ingest/bulk — lote con tipo explícito ('type' o 'format').
 */
#[instrument(skip_all)]
pub async fn handle_bulk_ingest(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Extension(timeline): Extension<TimelineRecorder>,
    Extension(auth_context): Extension<AuthContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let parsed_body: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(parse_fault) => return malformed_envelope_response(&parse_fault.to_string()),
    };

    let declared_type = parsed_body
        .get("type")
        .or_else(|| parsed_body.get("format"))
        .and_then(|value| value.as_str())
        .unwrap_or("");

    let Some(bulk_format) = IngestFormat::parse(declared_type) else {
        return malformed_envelope_response(&format!("unknown bulk type: {}", declared_type));
    };

    let collector_id = parsed_body
        .get("collector_id")
        .and_then(|value| value.as_str())
        .unwrap_or("bulk")
        .to_string();

    let records = match parsed_body.get("records") {
        Some(Value::Array(record_array)) => record_array.clone(),
        _ => return malformed_envelope_response("records array missing"),
    };

    ingest_core(
        state,
        timeline,
        auth_context,
        headers,
        connect_info,
        "/v1/ingest/bulk",
        collector_id,
        bulk_format,
        records,
    )
    .await
}

// =================================================================
// NÚCLEO COMPARTIDO
// =================================================================

/// Endpoints dedicados: aceptan un arreglo desnudo o un sobre {records}.
#[allow(clippy::too_many_arguments)]
async fn dedicated_format_ingest(
    state: AppState,
    timeline: TimelineRecorder,
    auth_context: AuthContext,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    endpoint_path: &'static str,
    format: IngestFormat,
    default_collector: &str,
    body: Bytes,
) -> Response {
    let parsed_body: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(parse_fault) => return malformed_envelope_response(&parse_fault.to_string()),
    };

    let (collector_id, records) = match parsed_body {
        Value::Array(record_array) => (default_collector.to_string(), record_array),
        Value::Object(ref envelope_object) => {
            let collector_id = envelope_object
                .get("collector_id")
                .and_then(|value| value.as_str())
                .unwrap_or(default_collector)
                .to_string();
            match envelope_object.get("records") {
                Some(Value::Array(record_array)) => (collector_id, record_array.clone()),
                _ => return malformed_envelope_response("records array missing"),
            }
        }
        _ => return malformed_envelope_response("body must be an array or an envelope object"),
    };

    ingest_core(
        state,
        timeline,
        auth_context,
        headers,
        connect_info,
        endpoint_path,
        collector_id,
        format,
        records,
    )
    .await
}

/**
 * Camino común de ingesta: guardas de tamaño, admisión por fuente,
 * idempotencia y entrega al pipeline.
 */
#[allow(clippy::too_many_arguments)]
async fn ingest_core(
    state: AppState,
    timeline: TimelineRecorder,
    auth_context: AuthContext,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    endpoint_path: &'static str,
    collector_id: String,
    format: IngestFormat,
    records: Vec<Value>,
) -> Response {
    // 1. GUARDA DE VOLUMEN: el lote de 10 000 pasa; 10 001 no.
    if records.len() > MAX_BATCH_RECORDS {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(json!({
                "error": "payload_too_large",
                "reason": format!("batch of {} exceeds the {} record ceiling", records.len(), MAX_BATCH_RECORDS)
            })),
        )
            .into_response();
    }

    let client_address = resolve_client_address(&headers, connect_info);

    // 2. ADMISIÓN POR FUENTE (subsistema opcional).
    if state.config.feature_sources {
        let verdict = state.source_directory.admit(
            &collector_id,
            client_address,
            records.len() as u32,
            ObservedOrigin::Http,
            now_epoch_ms(),
        );

        match verdict {
            DirectoryVerdict::Admitted { over_cap, .. } => {
                if over_cap {
                    state.metrics.record_over_cap();
                    debug!("📈 [ADMISSION]: Source {} admitted over its EPS cap.", collector_id);
                }
            }
            DirectoryVerdict::Rejected { reason, rate_limited } => {
                return admission_rejection(&state, &collector_id, reason, rate_limited);
            }
            DirectoryVerdict::UnknownSource => {
                return admission_rejection(
                    &state,
                    &collector_id,
                    SourceDirectory::unknown_source_reason(),
                    false,
                );
            }
        }
    }

    // 3. IDEMPOTENCIA: replay o transacción primaria.
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty());

    let inflight_guard = match idempotency_key {
        Some(client_key) => {
            match state
                .idempotency_vault
                .begin(&auth_context.tenant_id, endpoint_path, &client_key)
                .await
            {
                Ok(crate::state::idempotency_vault::BeginOutcome::Replay(stored)) => {
                    state.metrics.record_idempotent_replay();
                    debug!("🔁 [IDEMPOTENCY]: Replaying stored response for key '{}'.", client_key);
                    return replay_response(stored.status, stored.body);
                }
                Ok(crate::state::idempotency_vault::BeginOutcome::Fresh(guard)) => Some(guard),
                Err(vault_fault) => {
                    warn!("💀 [IDEMPOTENCY_FAULT]: {}", vault_fault);
                    None // la idempotencia degradada jamás bloquea la ingesta
                }
            }
        }
        None => None,
    };

    // 4. PIPELINE: validar + enriquecer + entregar.
    let outcome = state
        .pipeline
        .process_raw_batch(format, &records, &collector_id);

    timeline.record(
        TimelineStage::Validated,
        Some(json!({ "accepted": outcome.accepted, "rejected_records": outcome.rejected })),
    );
    timeline.record(
        TimelineStage::Enriched,
        Some(json!({ "records": outcome.accepted, "format": format.label() })),
    );
    timeline.record(TimelineStage::Posthook, Some(json!({ "enqueued": outcome.accepted > 0 })));

    let response_status = if outcome.is_total_failure() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else if outcome.is_partial() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::OK
    };

    let response_body =
        serde_json::to_string(&outcome).unwrap_or_else(|_| "{\"accepted\":0}".to_string());

    // 5. SELLADO IDEMPOTENTE de la respuesta primaria.
    if let Some(guard) = inflight_guard {
        if let Err(commit_fault) = state
            .idempotency_vault
            .commit(guard, response_status.as_u16(), &response_body)
            .await
        {
            warn!("💀 [IDEMPOTENCY_COMMIT]: {}", commit_fault);
        }
    }

    replay_response(response_status.as_u16(), response_body)
}

fn admission_rejection(
    state: &AppState,
    collector_id: &str,
    reason: &str,
    rate_limited: bool,
) -> Response {
    if rate_limited {
        state.metrics.record_rate_limited();
    } else {
        state.metrics.record_blocked();
    }

    warn!("⛔ [ADMISSION]: Source {} rejected: {}", collector_id, reason);

    let mut rejection = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "error": "admission_rejected", "reason": reason })),
    )
        .into_response();

    rejection.extensions_mut().insert(ResultOverride(if rate_limited {
        RequestResult::RateLimited
    } else {
        RequestResult::Blocked
    }));
    rejection
}

/// Construye la respuesta JSON con el cuerpo textual exacto.
fn replay_response(status: u16, body: String) -> Response {
    Response::builder()
        .status(StatusCode::from_u16(status).unwrap_or(StatusCode::OK))
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn malformed_envelope_response(detail: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "client_malformed", "detail": detail })),
    )
        .into_response()
}

fn resolve_client_address(
    headers: &HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> IpAddr {
    if let Some(ConnectInfo(socket_address)) = connect_info {
        return socket_address.ip();
    }

    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|forwarded| forwarded.split(',').next())
        .and_then(|first_hop| first_hop.trim().parse::<IpAddr>().ok())
        .unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED))
}
