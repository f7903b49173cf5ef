// [apps/gateway/src/handlers/requests.rs]
/*!
 * =================================================================
 * APARATO: AUDIT QUERY HANDLERS (V3.3 - ETAG + TAIL STREAM)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CONSULTAS DEL ANILLO Y STREAM DE COLA APPEND-ONLY
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ETAG DISCIPLINE: Dos consultas idénticas sin tráfico nuevo
 *    devuelven el mismo ETag; If-None-Match produce 304.
 * 2. RESUMABLE TAIL: Last-Event-ID reanuda desde la secuencia del
 *    anillo antes de engancharse al bus en vivo.
 * =================================================================
 */

use crate::services::event_bus::GatewayEvent;
use crate::state::audit_ring::AuditQuery;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::instrument;

/// Parámetros de la consulta de auditoría.
#[derive(Debug, Default, Deserialize)]
pub struct AuditListParams {
    pub method: Option<String>,
    /// Clase de estado como dígito: "2", "4", "5".
    pub status_class: Option<u16>,
    /// Fragmento de ruta (substring).
    pub path: Option<String>,
    pub client: Option<String>,
    pub tenant: Option<String>,
    /// Ventana relativa: "15m", "1h", "24h".
    pub window: Option<String>,
    #[serde(default)]
    pub exclude_monitoring: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/**
 * GET /v1/admin/requests — listado filtrado con paginación y ETag.
 */
#[instrument(skip(state, headers))]
pub async fn handle_list_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AuditListParams>,
) -> impl IntoResponse {
    let since = params.window.as_deref().and_then(parse_relative_window).map(|window_span| {
        Utc::now() - window_span
    });

    let ring_query = AuditQuery {
        method: params.method,
        status_class: params.status_class,
        path_contains: params.path,
        client_address: params.client,
        tenant_id: params.tenant,
        since,
        until: None,
        exclude_monitoring_paths: params.exclude_monitoring,
        limit: params.limit.unwrap_or(50).min(500),
        offset: params.offset.unwrap_or(0),
    };

    let page = state.audit_ring.query(&ring_query);

    // 304 si el cliente ya posee esta versión de la ventana.
    if let Some(presented_etag) = headers.get(header::IF_NONE_MATCH).and_then(|value| value.to_str().ok())
    {
        if presented_etag == page.etag {
            return StatusCode::NOT_MODIFIED.into_response();
        }
    }

    let mut response = (
        StatusCode::OK,
        Json(json!({
            "total": page.total_matching,
            "count": page.entries.len(),
            "entries": page.entries,
        })),
    )
        .into_response();

    if let Ok(etag_value) = page.etag.parse() {
        response.headers_mut().insert(header::ETAG, etag_value);
    }
    response
}

/**
 * GET /v1/admin/requests/{id} — entrada individual por trace id.
 */
#[instrument(skip(state))]
pub async fn handle_get_request(
    State(state): State<AppState>,
    Path(trace_id): Path<String>,
) -> impl IntoResponse {
    match state.audit_ring.get(&trace_id) {
        Some(entry) => (StatusCode::OK, Json(json!(entry))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "audit_entry_not_found" })),
        )
            .into_response(),
    }
}

/**
 * GET /v1/admin/requests/stream — cola append-only del anillo como
 * event-stream, con reanudación Last-Event-ID.
 */
#[instrument(skip(state, headers))]
pub async fn handle_request_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let resume_after_sequence = headers
        .get("last-event-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(0);

    // 1. REANUDACIÓN: entradas que el cliente se perdió.
    let replayed_entries = state.audit_ring.entries_after(resume_after_sequence, 1_000);
    let replay_stream = stream::iter(replayed_entries.into_iter().map(audit_entry_to_sse));

    // 2. COLA EN VIVO: suscripción al bus de señales.
    let live_stream = BroadcastStream::new(state.event_bus.subscribe()).filter_map(
        |bus_event| async move {
            match bus_event {
                Ok(GatewayEvent::AuditAppended(entry)) => Some(audit_entry_to_sse(entry)),
                _ => None,
            }
        },
    );

    Sse::new(replay_stream.chain(live_stream)).keep_alive(KeepAlive::default())
}

fn audit_entry_to_sse(entry: panoptes_domain_models::AuditEntry) -> Result<Event, Infallible> {
    let event_payload =
        serde_json::to_string(&entry).unwrap_or_else(|_| "{}".to_string());

    Ok(Event::default()
        .id(entry.sequence.to_string())
        .event("audit")
        .data(event_payload))
}

/// "15m" -> 15 minutos; "2h" -> 2 horas; "1d" -> 1 día.
fn parse_relative_window(raw_window: &str) -> Option<Duration> {
    let trimmed = raw_window.trim();
    if trimmed.len() < 2 {
        return None;
    }

    let (magnitude_text, unit_suffix) = trimmed.split_at(trimmed.len() - 1);
    let magnitude: i64 = magnitude_text.parse().ok()?;

    match unit_suffix {
        "s" => Some(Duration::seconds(magnitude)),
        "m" => Some(Duration::minutes(magnitude)),
        "h" => Some(Duration::hours(magnitude)),
        "d" => Some(Duration::days(magnitude)),
        _ => None,
    }
}
