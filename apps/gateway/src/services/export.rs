// [apps/gateway/src/services/export.rs]
/*!
 * =================================================================
 * APARATO: EXPORT WORKER ENGINE (V4.3 - AT-LEAST-ONCE RELAY)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: ENTREGA COALESCENTE A SPLUNK HEC Y ELASTIC BULK
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. MAILBOX DISCIPLINE: Cada worker posee un buzón acotado; al 100%
 *    de ocupación el pipeline desaloja el lote más viejo y admite el
 *    nuevo, preservando recencia para el operador.
 * 2. IDEMPOTENT BATCH ID: Todo lote viaja con id estable; el sink
 *    tolera duplicados (semántica at-least-once).
 * 3. FAULT QUARANTINE: El fallo definitivo deposita el lote en la cola
 *    de cartas muertas; un sink caído jamás corrompe al otro.
 * =================================================================
 */

use crate::services::event_bus::EventBus;
use crate::state::metrics_hub::MetricsHub;
use chrono::{Duration as ChronoDuration, Utc};
use panoptes_domain_models::{DlqEntry, EnrichedRecord, SinkTarget};
use panoptes_infra_db::repositories::DlqRepository;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Retardo base de la retirada exponencial.
const BACKOFF_BASE_MS: u64 = 500;
/// Factor de crecimiento entre intentos.
const BACKOFF_FACTOR: u64 = 2;
/// Techo absoluto del retardo.
const BACKOFF_CAP_MS: u64 = 30_000;
/// Amplitud del jitter: ±20 %.
const BACKOFF_JITTER_RATIO: f64 = 0.20;
/// Umbral de ocupación que activa la señal de contrapresión.
pub const BACKPRESSURE_THRESHOLD: f64 = 0.80;

/// Lote de exportación con identidad estable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportBatch {
    pub batch_id: String,
    pub source_label: String,
    pub records: Vec<EnrichedRecord>,
}

impl ExportBatch {
    pub fn new(source_label: &str, records: Vec<EnrichedRecord>) -> Self {
        Self {
            batch_id: Uuid::new_v4().to_string(),
            source_label: source_label.to_string(),
            records,
        }
    }
}

/// Veredicto de la entrega de un lote al buzón.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Stored,
    /// Buzón lleno: el lote más viejo fue desalojado para admitir el nuevo.
    DroppedOldest,
}

/**
 * Buzón acotado de un worker de exportación.
 */
pub struct ExportMailbox {
    queue: Mutex<VecDeque<ExportBatch>>,
    capacity: usize,
    batch_available: Notify,
    closed: AtomicBool,
}

impl ExportMailbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            batch_available: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /**
     * Entrega no bloqueante del pipeline: al 100% de ocupación se
     * desaloja la cabeza (política de recencia del contrato).
     */
    pub fn submit(&self, batch: ExportBatch) -> SubmitOutcome {
        let mut queue_guard = self.queue.lock().expect("FATAL: export mailbox lock poisoned.");

        let outcome = if queue_guard.len() >= self.capacity {
            queue_guard.pop_front();
            SubmitOutcome::DroppedOldest
        } else {
            SubmitOutcome::Stored
        };

        queue_guard.push_back(batch);
        drop(queue_guard);
        self.batch_available.notify_one();
        outcome
    }

    /// Próximo lote, esperando si el buzón está vacío.
    pub async fn next_batch(&self) -> Option<ExportBatch> {
        loop {
            let batch_signal = self.batch_available.notified();

            {
                let mut queue_guard =
                    self.queue.lock().expect("FATAL: export mailbox lock poisoned.");
                if let Some(batch) = queue_guard.pop_front() {
                    return Some(batch);
                }
            }

            if self.closed.load(Ordering::Acquire) {
                return None;
            }

            let _ = tokio::time::timeout(Duration::from_millis(250), batch_signal).await;
        }
    }

    /// Drenaje completo para el apagado ordenado.
    pub fn drain(&self) -> Vec<ExportBatch> {
        let mut queue_guard = self.queue.lock().expect("FATAL: export mailbox lock poisoned.");
        queue_guard.drain(..).collect()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.batch_available.notify_waiters();
    }

    pub fn occupancy(&self) -> f64 {
        let queue_guard = self.queue.lock().expect("FATAL: export mailbox lock poisoned.");
        queue_guard.len() as f64 / self.capacity as f64
    }

    pub fn len(&self) -> usize {
        self.queue.lock().expect("FATAL: export mailbox lock poisoned.").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Configuración viva de un sink, mutable vía /v1/outputs.
#[derive(Debug, Clone, Default)]
pub struct SinkConfig {
    pub endpoint_url: Option<String>,
    pub auth_token: Option<String>,
}

/**
 * Enrutador de sinks: custodia la configuración de ambos destinos.
 */
#[derive(Debug, Default)]
pub struct SinkRouter {
    splunk: RwLock<SinkConfig>,
    elastic: RwLock<SinkConfig>,
}

impl SinkRouter {
    pub fn new(splunk: SinkConfig, elastic: SinkConfig) -> Self {
        Self { splunk: RwLock::new(splunk), elastic: RwLock::new(elastic) }
    }

    pub fn configure(&self, target: SinkTarget, config: SinkConfig) {
        let slot = match target {
            SinkTarget::Splunk => &self.splunk,
            SinkTarget::Elastic => &self.elastic,
        };
        *slot.write().expect("FATAL: sink config lock poisoned.") = config;
        info!("🔧 [SINK_ROUTER]: {} sink reconfigured.", target.label());
    }

    pub fn config_for(&self, target: SinkTarget) -> SinkConfig {
        let slot = match target {
            SinkTarget::Splunk => &self.splunk,
            SinkTarget::Elastic => &self.elastic,
        };
        slot.read().expect("FATAL: sink config lock poisoned.").clone()
    }
}

// --- CONSTRUCCIÓN DE CUERPOS DE SINK ---

/**
 * Cuerpo Splunk HEC: un objeto evento por línea.
 */
pub fn build_splunk_body(batch: &ExportBatch) -> String {
    batch
        .records
        .iter()
        .map(|record| {
            serde_json::json!({
                "event": record,
                "sourcetype": "panoptes:flow",
                "source": batch.source_label,
                "fields": { "batch_id": batch.batch_id }
            })
            .to_string()
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/**
 * Cuerpo Elastic _bulk (NDJSON): acción index + documento, con el
 * record_id como _id para la tolerancia de duplicados del sink.
 */
pub fn build_elastic_body(batch: &ExportBatch) -> String {
    let mut ndjson_lines = String::new();
    for record in &batch.records {
        ndjson_lines.push_str(
            &serde_json::json!({ "index": { "_index": "panoptes-flows", "_id": record.record_id } })
                .to_string(),
        );
        ndjson_lines.push('\n');
        ndjson_lines.push_str(&serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string()));
        ndjson_lines.push('\n');
    }
    ndjson_lines
}

// --- RETIRADA EXPONENCIAL ---

/// Retardo determinista del intento (sin jitter): base * factor^n, con techo.
pub fn backoff_base_delay(attempt_index: u32) -> Duration {
    let exponential_ms = BACKOFF_BASE_MS.saturating_mul(BACKOFF_FACTOR.saturating_pow(attempt_index));
    Duration::from_millis(exponential_ms.min(BACKOFF_CAP_MS))
}

/// Aplica jitter ±20 % sobre el retardo determinista.
pub fn backoff_with_jitter(attempt_index: u32) -> Duration {
    let base_delay = backoff_base_delay(attempt_index);
    let jitter_span = base_delay.as_millis() as f64 * BACKOFF_JITTER_RATIO;
    let jitter_offset = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
    let final_ms = (base_delay.as_millis() as f64 + jitter_offset).max(0.0) as u64;
    Duration::from_millis(final_ms.min(BACKOFF_CAP_MS))
}

// --- TRANSPORTE HTTP ---

/**
 * Envía el cuerpo ya construido al sink configurado.
 * Un sink sin endpoint configurado se reporta como 'Unconfigured'.
 */
pub enum SinkDispatch {
    Delivered,
    Unconfigured,
    Failed(String),
}

pub async fn dispatch_to_sink(
    http_client: &Client,
    target: SinkTarget,
    sink_config: &SinkConfig,
    body: String,
) -> SinkDispatch {
    let Some(endpoint_url) = &sink_config.endpoint_url else {
        return SinkDispatch::Unconfigured;
    };

    let request_builder = match target {
        SinkTarget::Splunk => {
            let mut builder = http_client
                .post(format!("{}/services/collector/event", endpoint_url.trim_end_matches('/')))
                .header("Content-Type", "application/json");
            if let Some(token) = &sink_config.auth_token {
                builder = builder.header("Authorization", format!("Splunk {}", token));
            }
            builder
        }
        SinkTarget::Elastic => {
            let mut builder = http_client
                .post(format!("{}/_bulk", endpoint_url.trim_end_matches('/')))
                .header("Content-Type", "application/x-ndjson");
            if let Some(api_key) = &sink_config.auth_token {
                builder = builder.header("Authorization", format!("ApiKey {}", api_key));
            }
            builder
        }
    };

    match request_builder.body(body).send().await {
        Ok(response) if response.status().is_success() => SinkDispatch::Delivered,
        Ok(response) => SinkDispatch::Failed(format!("HTTP {}", response.status().as_u16())),
        Err(network_fault) => SinkDispatch::Failed(format!("NETWORK: {}", network_fault)),
    }
}

/**
 * Worker de exportación de un sink: coalescencia, reintentos y DLQ.
 */
pub struct ExportWorker {
    target: SinkTarget,
    mailbox: Arc<ExportMailbox>,
    sink_router: Arc<SinkRouter>,
    dlq_repository: Arc<DlqRepository>,
    metrics: Arc<MetricsHub>,
    event_bus: Arc<EventBus>,
    http_client: Client,
    batch_max_records: usize,
    flush_interval: Duration,
    retry_max_attempts: u32,
    dlq_replay_interval: Duration,
}

impl ExportWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        target: SinkTarget,
        mailbox: Arc<ExportMailbox>,
        sink_router: Arc<SinkRouter>,
        dlq_repository: Arc<DlqRepository>,
        metrics: Arc<MetricsHub>,
        event_bus: Arc<EventBus>,
        batch_max_records: usize,
        flush_interval_ms: u64,
        retry_max_attempts: u32,
        dlq_replay_ms: u64,
    ) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .user_agent("Panoptes-Export-Relay/4.3")
            .build()
            .expect("FATAL: Failed to initialize export uplink client.");

        Self {
            target,
            mailbox,
            sink_router,
            dlq_repository,
            metrics,
            event_bus,
            http_client,
            batch_max_records: batch_max_records.max(1),
            flush_interval: Duration::from_millis(flush_interval_ms.max(10)),
            retry_max_attempts: retry_max_attempts.max(1),
            dlq_replay_interval: Duration::from_millis(dlq_replay_ms.max(1_000)),
        }
    }

    /**
     * Bucle perpetuo del worker: coalescencia por volumen o por tiempo.
     * Ante la señal de apagado drena los buffers hacia la DLQ.
     */
    pub async fn run(self, mut shutdown_signal: watch::Receiver<bool>) {
        info!("🚚 [EXPORT_WORKER]: {} relay online.", self.target.label());

        let mut coalescing_records: Vec<EnrichedRecord> = Vec::new();
        let mut coalescing_label = String::new();
        let mut flush_ticker = tokio::time::interval(self.flush_interval);
        flush_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                incoming = self.mailbox.next_batch() => {
                    match incoming {
                        Some(batch) => {
                            if coalescing_label.is_empty() {
                                coalescing_label = batch.source_label.clone();
                            }
                            coalescing_records.extend(batch.records);

                            if coalescing_records.len() >= self.batch_max_records {
                                self.flush_buffer(&mut coalescing_records, &mut coalescing_label).await;
                            }
                        }
                        None => break,
                    }
                },
                _ = flush_ticker.tick() => {
                    if !coalescing_records.is_empty() {
                        self.flush_buffer(&mut coalescing_records, &mut coalescing_label).await;
                    }
                },
                _ = shutdown_signal.changed() => {
                    if *shutdown_signal.borrow() {
                        break;
                    }
                },
            }
        }

        // --- APAGADO ORDENADO: drenaje hacia la DLQ ---
        self.drain_to_dlq(coalescing_records, coalescing_label).await;
        info!("🛑 [EXPORT_WORKER]: {} relay drained and offline.", self.target.label());
    }

    async fn flush_buffer(&self, records: &mut Vec<EnrichedRecord>, label: &mut String) {
        let flush_records = std::mem::take(records);
        let flush_label = std::mem::take(label);
        if flush_records.is_empty() {
            return;
        }

        let batch = ExportBatch::new(
            if flush_label.is_empty() { "mixed" } else { &flush_label },
            flush_records,
        );
        self.deliver_or_quarantine(batch).await;
    }

    /**
     * Entrega con reintentos; el fallo definitivo deposita en la DLQ.
     */
    #[instrument(skip(self, batch), fields(sink = self.target.label(), batch_id = %batch.batch_id))]
    async fn deliver_or_quarantine(&self, batch: ExportBatch) {
        let sink_config = self.sink_router.config_for(self.target);

        if sink_config.endpoint_url.is_none() {
            // Sink no configurado: el lote se descarta con rastro de depuración.
            debug!("💤 [EXPORT_SKIP]: {} sink unconfigured; batch {} discarded.",
                self.target.label(), batch.batch_id);
            return;
        }

        let body = match self.target {
            SinkTarget::Splunk => build_splunk_body(&batch),
            SinkTarget::Elastic => build_elastic_body(&batch),
        };

        let mut last_failure = String::new();

        for attempt_index in 0..self.retry_max_attempts {
            match dispatch_to_sink(&self.http_client, self.target, &sink_config, body.clone()).await {
                SinkDispatch::Delivered => {
                    debug!("✅ [EXPORT_OK]: Batch {} delivered to {} (attempt {}).",
                        batch.batch_id, self.target.label(), attempt_index + 1);
                    return;
                }
                SinkDispatch::Unconfigured => return,
                SinkDispatch::Failed(failure_detail) => {
                    last_failure = failure_detail;
                    warn!("⚠️ [EXPORT_RETRY]: Batch {} to {} failed attempt {}: {}",
                        batch.batch_id, self.target.label(), attempt_index + 1, last_failure);

                    if attempt_index + 1 < self.retry_max_attempts {
                        tokio::time::sleep(backoff_with_jitter(attempt_index)).await;
                    }
                }
            }
        }

        self.quarantine(batch, self.retry_max_attempts, &last_failure).await;
    }

    async fn quarantine(&self, batch: ExportBatch, attempts_made: u32, failure_detail: &str) {
        let now = Utc::now();
        let quarantined_entry = DlqEntry {
            id: batch.batch_id.clone(),
            destination: self.target,
            payload: serde_json::to_value(&batch).unwrap_or(serde_json::Value::Null),
            first_attempt_at: now,
            last_attempt_at: now,
            attempts: attempts_made,
            next_eligible_at: now
                + ChronoDuration::milliseconds(self.dlq_replay_interval.as_millis() as i64),
            last_error: failure_detail.to_string(),
        };

        match self.dlq_repository.append(&quarantined_entry).await {
            Ok(()) => {
                self.metrics.record_dlq_appended();
                self.event_bus.emit_log(
                    "WARN",
                    "EXPORT",
                    &format!(
                        "batch {} quarantined for {} after {} attempts: {}",
                        batch.batch_id,
                        self.target.label(),
                        attempts_made,
                        failure_detail
                    ),
                );
            }
            Err(dlq_fault) => {
                error!("💀 [DLQ_FAULT]: Batch {} could not be quarantined: {}", batch.batch_id, dlq_fault);
            }
        }
    }

    /// Drenaje de apagado: todo lo pendiente se preserva en la DLQ.
    async fn drain_to_dlq(&self, leftover_records: Vec<EnrichedRecord>, leftover_label: String) {
        let mut parked_batches = 0usize;

        if !leftover_records.is_empty() {
            let leftover_batch = ExportBatch::new(
                if leftover_label.is_empty() { "mixed" } else { &leftover_label },
                leftover_records,
            );
            self.quarantine(leftover_batch, 0, "SHUTDOWN_DRAIN").await;
            parked_batches += 1;
        }

        for pending_batch in self.mailbox.drain() {
            self.quarantine(pending_batch, 0, "SHUTDOWN_DRAIN").await;
            parked_batches += 1;
        }

        if parked_batches > 0 {
            info!("📮 [EXPORT_DRAIN]: {} preserved {} pending batches into the DLQ.",
                self.target.label(), parked_batches);
        }
    }
}
