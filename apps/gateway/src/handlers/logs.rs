// [apps/gateway/src/handlers/logs.rs]
/*!
 * =================================================================
 * APARATO: STRUCTURED LOG STREAM HANDLER (V2.0)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: EVENT-STREAM DE LOGS ESTRUCTURADOS DEL GATEWAY
 * =================================================================
 */

use crate::services::event_bus::GatewayEvent;
use crate::state::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::instrument;

/**
 * GET /v1/logs/stream — tramas de log estructurado en vivo.
 */
#[instrument(skip(state))]
pub async fn handle_log_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let live_stream = BroadcastStream::new(state.event_bus.subscribe()).filter_map(
        |bus_event| async move {
            match bus_event {
                Ok(GatewayEvent::LogEmitted(log_frame)) => {
                    let frame_payload =
                        serde_json::to_string(&log_frame).unwrap_or_else(|_| "{}".to_string());
                    Some(Ok::<Event, Infallible>(
                        Event::default().id(log_frame.id.clone()).event("log").data(frame_payload),
                    ))
                }
                _ => None,
            }
        },
    );

    Sse::new(live_stream).keep_alive(KeepAlive::default())
}
