// [apps/gateway/src/middleware.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY GUARD CHAIN (V4.4 - AUDIT ENVELOPE MASTER)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4)
 * RESPONSABILIDAD: WARMING GATE, AUTENTICACIÓN, SCOPES, LÍMITES
 *                  GLOBALES Y SOBRE DE AUDITORÍA POR PETICIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. LENIENT HEADERS: La clave se acepta como 'Bearer <k>', cabecera
 *    Authorization desnuda, X-API-Key, y 'key=' solo en streams.
 * 2. ONE ENTRY PER REQUEST: El sobre exterior garantiza exactamente
 *    una entrada de auditoría por petición completada.
 * 3. DEADLINE DISCIPLINE: Todo handler corre bajo el plazo global; el
 *    vencimiento produce 500 con trace id opaco.
 * =================================================================
 */

use crate::state::source_directory::now_epoch_ms;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use panoptes_domain_admission::TokenBucketCell;
use panoptes_domain_models::audit::{
    compute_fitness, fingerprint_api_key, AuditEntry, RequestResult, TimelineEvent, TimelineStage,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Rutas públicas: exentas de warming, autenticación y límites globales.
const PUBLIC_PATHS: &[&str] = &["/v1/health", "/v1/version"];

// =================================================================
// ESTRATO DE IDENTIDAD: CLAVES, CLASES Y SCOPES
// =================================================================

/// Permisos enumerados del contrato de la superficie HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Ingest,
    ManageIndicators,
    Export,
    ReadRequests,
    ReadMetrics,
    Admin,
}

/// Clase de la clave API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    Admin,
    User,
}

/// Las claves admin portan la matriz completa de scopes.
const ADMIN_SCOPES: &[Scope] = &[
    Scope::Ingest,
    Scope::ManageIndicators,
    Scope::Export,
    Scope::ReadRequests,
    Scope::ReadMetrics,
    Scope::Admin,
];

/// Las claves de usuario cubren ingesta y lecturas.
const USER_SCOPES: &[Scope] = &[Scope::Ingest, Scope::ReadMetrics, Scope::ReadRequests];

/// Claves de desarrollo integradas (solo con ALLOW_DEV_KEYS).
const DEV_ADMIN_KEY: &str = "dev-admin-key";
const DEV_USER_KEY: &str = "dev-user-key";

/// Identidad resuelta de la petición, inyectada en las extensiones.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub key_class: KeyClass,
    pub tenant_id: String,
    pub fingerprint: String,
}

impl AuthContext {
    pub fn scopes(&self) -> &'static [Scope] {
        match self.key_class {
            KeyClass::Admin => ADMIN_SCOPES,
            KeyClass::User => USER_SCOPES,
        }
    }

    pub fn has_scope(&self, required_scope: Scope) -> bool {
        self.scopes().contains(&required_scope)
    }
}

/**
 * Registro de claves API del proceso, fijado en el arranque.
 */
pub struct KeyRing {
    registry: HashMap<String, KeyClass>,
}

impl KeyRing {
    pub fn from_config(config: &crate::config::GatewayConfig) -> Self {
        let mut registry = HashMap::new();

        for admin_key in &config.admin_keys {
            registry.insert(admin_key.clone(), KeyClass::Admin);
        }
        for user_key in &config.user_keys {
            registry.insert(user_key.clone(), KeyClass::User);
        }
        if config.allow_dev_keys {
            registry.insert(DEV_ADMIN_KEY.to_string(), KeyClass::Admin);
            registry.insert(DEV_USER_KEY.to_string(), KeyClass::User);
        }

        Self { registry }
    }

    pub fn resolve(&self, raw_key: &str) -> Option<AuthContext> {
        let key_class = *self.registry.get(raw_key)?;
        Some(AuthContext {
            key_class,
            tenant_id: match key_class {
                KeyClass::Admin => "admin".to_string(),
                KeyClass::User => "default".to_string(),
            },
            fingerprint: fingerprint_api_key(raw_key),
        })
    }
}

// =================================================================
// ESTRATO DE LÍNEA DE TIEMPO POR PETICIÓN
// =================================================================

/// Grabadora de hitos del ciclo de vida, compartida con los handlers.
#[derive(Clone)]
pub struct TimelineRecorder {
    started_at: Instant,
    events: Arc<Mutex<Vec<TimelineEvent>>>,
}

impl TimelineRecorder {
    pub fn start() -> Self {
        let recorder = Self { started_at: Instant::now(), events: Arc::new(Mutex::new(Vec::new())) };
        recorder.record(TimelineStage::Received, None);
        recorder
    }

    pub fn record(&self, stage: TimelineStage, meta: Option<serde_json::Value>) {
        let normalized_meta = meta.and_then(|value| {
            value.as_object().map(|object| {
                object
                    .iter()
                    .map(|(key, val)| (key.clone(), val.clone()))
                    .collect::<HashMap<_, _>>()
            })
        });

        let mut events_guard = self.events.lock().expect("FATAL: timeline lock poisoned.");
        events_guard.push(TimelineEvent {
            stage,
            offset_ms: self.started_at.elapsed().as_millis() as u64,
            meta: normalized_meta,
        });
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    fn drain(&self) -> Vec<TimelineEvent> {
        self.events.lock().expect("FATAL: timeline lock poisoned.").clone()
    }
}

/// Clase de resultado forzada por el handler (blocked / rate_limited).
#[derive(Debug, Clone, Copy)]
pub struct ResultOverride(pub RequestResult);

// =================================================================
// ESTRATO DE LÍMITES GLOBALES (RPM)
// =================================================================

struct RpmCell {
    cell: TokenBucketCell,
    rate_per_second: u32,
}

/// Limitadores globales de peticiones por clase de ruta.
pub struct RpmLimiters {
    ingest_limiter: Option<RpmCell>,
    default_limiter: Option<RpmCell>,
}

impl RpmLimiters {
    pub fn from_config(config: &crate::config::GatewayConfig) -> Self {
        Self {
            ingest_limiter: build_rpm_cell(config.rate_limit_ingest_rpm),
            default_limiter: build_rpm_cell(config.rate_limit_default_rpm),
        }
    }

    /// Verdadero si la petición cabe en el presupuesto global de su clase.
    pub fn admit(&self, is_ingest_path: bool) -> bool {
        let selected_limiter = if is_ingest_path {
            &self.ingest_limiter
        } else {
            &self.default_limiter
        };

        match selected_limiter {
            Some(rpm_cell) => rpm_cell.cell.try_acquire(rpm_cell.rate_per_second, 1, now_epoch_ms()),
            None => true,
        }
    }
}

fn build_rpm_cell(requests_per_minute: u32) -> Option<RpmCell> {
    if requests_per_minute == 0 {
        return None;
    }
    let rate_per_second = (requests_per_minute / 60).max(1);
    Some(RpmCell { cell: TokenBucketCell::new_full(rate_per_second, now_epoch_ms()), rate_per_second })
}

// =================================================================
// GUARDIAS
// =================================================================

// Los guardias anidados bajo /v1 observan la ruta con el prefijo ya
// recortado por el router; ambas formas se aceptan.
fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || matches!(path, "/health" | "/version")
}

fn is_ingest_path(path: &str) -> bool {
    path.starts_with("/v1/ingest") || path.starts_with("/ingest")
}

fn is_stream_path(path: &str) -> bool {
    path.ends_with("/stream")
}

/**
 * Guardia de warming: 503 en rutas no públicas hasta completar las
 * migraciones del Ledger.
 */
pub async fn warming_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.is_ready() && !is_public_path(request.uri().path()) {
        warn!("⛔ [WARMING_GATE]: Request rejected; migrations still running.");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "warming_up", "retry_after": 5 })),
        )
            .into_response();
    }
    next.run(request).await
}

/**
 * Guardia de autenticación con extracción laxa de la clave.
 *
 * # Logic:
 *   1. 'Authorization: Bearer <k>' o 'Authorization: <k>'.
 *   2. 'X-API-Key: <k>'.
 *   3. '?key=<k>' únicamente en endpoints de event-stream.
 *   4. Clave ausente o desconocida -> 401.
 */
pub async fn auth_guard(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_path = request.uri().path().to_string();

    if is_public_path(&request_path) {
        return next.run(request).await;
    }

    let presented_key = extract_api_key(&request, &request_path);

    let Some(raw_key) = presented_key else {
        debug!("❌ [AUTH]: No credential presented for {}.", request_path);
        return unauthorized_response();
    };

    let Some(auth_context) = state.key_ring.resolve(&raw_key) else {
        warn!("❌ [AUTH_REJECTION]: Unknown API key (fingerprint {}).", fingerprint_api_key(&raw_key));
        return unauthorized_response();
    };

    request.extensions_mut().insert(auth_context.clone());
    let mut response = next.run(request).await;
    // Eco hacia el sobre de auditoría exterior.
    response.extensions_mut().insert(auth_context);
    response
}

fn extract_api_key(request: &Request, request_path: &str) -> Option<String> {
    if let Some(authorization_value) =
        request.headers().get(header::AUTHORIZATION).and_then(|value| value.to_str().ok())
    {
        let trimmed_value = authorization_value.trim();
        let bare_key = trimmed_value.strip_prefix("Bearer ").unwrap_or(trimmed_value).trim();
        if !bare_key.is_empty() {
            return Some(bare_key.to_string());
        }
    }

    if let Some(api_key_header) =
        request.headers().get("x-api-key").and_then(|value| value.to_str().ok())
    {
        let trimmed_key = api_key_header.trim();
        if !trimmed_key.is_empty() {
            return Some(trimmed_key.to_string());
        }
    }

    // Parámetro de consulta: únicamente para los túneles event-stream.
    if is_stream_path(request_path) {
        if let Some(query_string) = request.uri().query() {
            for query_pair in query_string.split('&') {
                if let Some(key_value) = query_pair.strip_prefix("key=") {
                    if !key_value.is_empty() {
                        return Some(key_value.to_string());
                    }
                }
            }
        }
    }

    None
}

fn unauthorized_response() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response()
}

/**
 * Fabrica la guardia de scope de un estrato de rutas.
 * Clave conocida sin el scope requerido -> 403.
 */
pub fn require_scope(
    required_scope: Scope,
) -> impl Fn(Request, Next) -> futures::future::BoxFuture<'static, Response> + Clone {
    move |request: Request, next: Next| {
        Box::pin(async move {
            let Some(auth_context) = request.extensions().get::<AuthContext>() else {
                return unauthorized_response();
            };

            if !auth_context.has_scope(required_scope) {
                warn!(
                    "🚫 [SCOPE_GUARD]: Key {} lacks {:?} for {}.",
                    auth_context.fingerprint,
                    required_scope,
                    request.uri().path()
                );
                return (
                    StatusCode::FORBIDDEN,
                    Json(json!({ "error": "forbidden", "required_scope": format!("{:?}", required_scope) })),
                )
                    .into_response();
            }

            next.run(request).await
        })
    }
}

// =================================================================
// SOBRE DE AUDITORÍA (EXTERIOR)
// =================================================================

/**
 * Sobre exterior: traza, plazo, límites globales y sellado de la
 * entrada de auditoría exactamente una vez por petición completada.
 */
pub async fn audit_envelope(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let trace_id = Uuid::new_v4().to_string();
    let request_method = request.method().to_string();
    let request_path = request.uri().path().to_string();

    let client_address = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|connect_info| connect_info.0.ip().to_string())
        .or_else(|| {
            request
                .headers()
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
                .map(|forwarded| forwarded.split(',').next().unwrap_or("").trim().to_string())
        })
        .filter(|address| !address.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    let bytes_in = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(0);

    let timeline_recorder = TimelineRecorder::start();

    // --- LÍMITE GLOBAL RPM (rutas no públicas) ---
    let globally_admitted =
        is_public_path(&request_path) || state.rpm_limiters.admit(is_ingest_path(&request_path));

    let mut request = request;
    request.extensions_mut().insert(timeline_recorder.clone());
    request.extensions_mut().insert(TraceId(trace_id.clone()));

    let response: Response = if !globally_admitted {
        state.metrics.record_rate_limited();
        let mut limited_response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "rate_limited", "reason": "rate_limited:global" })),
        )
            .into_response();
        limited_response.extensions_mut().insert(ResultOverride(RequestResult::RateLimited));
        limited_response
    } else {
        // --- PLAZO GLOBAL DEL HANDLER ---
        let deadline = Duration::from_secs(state.config.request_timeout_sec.max(1));
        match tokio::time::timeout(deadline, next.run(request)).await {
            Ok(handler_response) => handler_response,
            Err(_) => {
                warn!("⏰ [DEADLINE]: Request {} {} exceeded the handler deadline.", request_method, request_path);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "fatal_internal", "trace_id": trace_id })),
                )
                    .into_response()
            }
        }
    };

    // --- SELLADO DE LA ENTRADA DE AUDITORÍA ---
    timeline_recorder.record(TimelineStage::Completed, None);

    let status_code = response.status().as_u16();
    let duration_ms = timeline_recorder.elapsed_ms();

    let result_class = response
        .extensions()
        .get::<ResultOverride>()
        .map(|override_marker| override_marker.0)
        .unwrap_or_else(|| RequestResult::from_status(status_code));

    let auth_echo = response.extensions().get::<AuthContext>().cloned();

    let bytes_out = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(0);

    let mut timeline = timeline_recorder.drain();
    redact_timeline_meta(&state, &mut timeline);

    let fitness = compute_fitness(status_code, &timeline);

    let audit_entry = AuditEntry {
        trace_id: trace_id.clone(),
        sequence: 0, // asignada por el anillo
        timestamp: Utc::now(),
        method: request_method,
        path: request_path,
        status: status_code,
        duration_ms,
        client_address,
        tenant_id: auth_echo.as_ref().map(|context| context.tenant_id.clone()),
        api_key_fingerprint: auth_echo.map(|context| context.fingerprint),
        bytes_in,
        bytes_out,
        result: result_class,
        timeline,
        error: None,
        fitness,
    };

    let sealed_entry = state.audit_ring.append(audit_entry);
    state.event_bus.emit_audit_entry(sealed_entry);
    state.metrics.record_request(status_code, duration_ms as f64);

    attach_trace_header(response, &trace_id)
}

/// Identificador de traza de la petición en curso.
#[derive(Debug, Clone)]
pub struct TraceId(pub String);

fn redact_timeline_meta(state: &AppState, timeline: &mut [TimelineEvent]) {
    for timeline_event in timeline.iter_mut() {
        if let Some(event_meta) = &mut timeline_event.meta {
            for meta_value in event_meta.values_mut() {
                state.redaction.redact_json_fields(meta_value);
            }
            // Claves del propio meta listadas para redacción.
            let mut as_value = serde_json::Value::Object(
                event_meta.iter().map(|(key, value)| (key.clone(), value.clone())).collect(),
            );
            state.redaction.redact_json_fields(&mut as_value);
            if let serde_json::Value::Object(redacted_map) = as_value {
                *event_meta = redacted_map.into_iter().collect();
            }
        }
    }
}

fn attach_trace_header(mut response: Response<Body>, trace_id: &str) -> Response<Body> {
    if let Ok(header_value) = trace_id.parse() {
        response.headers_mut().insert("x-trace-id", header_value);
    }
    response
}
