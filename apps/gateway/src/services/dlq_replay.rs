// [apps/gateway/src/services/dlq_replay.rs]
/*!
 * =================================================================
 * APARATO: DLQ REPLAY DAEMON (V3.1 - SLOW CADENCE REDELIVERY)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: REINTENTO LENTO Y COMPACTACIÓN POR RETENCIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SLOW CADENCE: La redelivery corre a ritmo de minutos, jamás
 *    compite con el camino caliente de exportación.
 * 2. RETENTION HONOR: Todo lote más allá del horizonte se purga antes
 *    del escrutinio; lo recuperable se reintenta hasta entonces.
 * =================================================================
 */

use crate::services::export::{
    build_elastic_body, build_splunk_body, dispatch_to_sink, ExportBatch, SinkDispatch, SinkRouter,
};
use crate::services::event_bus::EventBus;
use crate::state::metrics_hub::MetricsHub;
use chrono::{Duration as ChronoDuration, Utc};
use panoptes_domain_models::SinkTarget;
use panoptes_infra_db::repositories::DlqRepository;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Lotes examinados por ciclo de replay.
const REPLAY_SCAN_BATCH: i64 = 25;

pub struct DlqReplayDaemon {
    dlq_repository: Arc<DlqRepository>,
    sink_router: Arc<SinkRouter>,
    metrics: Arc<MetricsHub>,
    event_bus: Arc<EventBus>,
    http_client: Client,
    replay_interval: Duration,
    retention_seconds: i64,
}

impl DlqReplayDaemon {
    pub fn new(
        dlq_repository: Arc<DlqRepository>,
        sink_router: Arc<SinkRouter>,
        metrics: Arc<MetricsHub>,
        event_bus: Arc<EventBus>,
        replay_interval_ms: u64,
        retention_seconds: i64,
    ) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Panoptes-DLQ-Replay/3.1")
            .build()
            .expect("FATAL: Failed to initialize DLQ replay client.");

        Self {
            dlq_repository,
            sink_router,
            metrics,
            event_bus,
            http_client,
            replay_interval: Duration::from_millis(replay_interval_ms.max(1_000)),
            retention_seconds,
        }
    }

    /**
     * Bucle perpetuo de redelivery con compactación previa.
     */
    pub async fn run(self, mut shutdown_signal: watch::Receiver<bool>) {
        info!("🏛️  [DLQ_REPLAY]: Redelivery daemon online (cadence {:?}).", self.replay_interval);
        let mut replay_ticker = tokio::time::interval(self.replay_interval);
        replay_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = replay_ticker.tick() => {
                    if let Err(cycle_fault) = self.execute_replay_cycle().await {
                        error!("❌ [DLQ_REPLAY_FAULT]: Cycle failed: {}", cycle_fault);
                    }
                },
                _ = shutdown_signal.changed() => {
                    if *shutdown_signal.borrow() {
                        break;
                    }
                },
            }
        }

        info!("🛑 [DLQ_REPLAY]: Redelivery daemon offline.");
    }

    async fn execute_replay_cycle(&self) -> anyhow::Result<()> {
        let now = Utc::now();

        // 1. COMPACTACIÓN: lo que cruzó el horizonte deja de ser recuperable.
        self.dlq_repository.purge_expired(now, self.retention_seconds).await?;

        // 2. ESCRUTINIO: lotes elegibles de este ciclo.
        let eligible_entries = self.dlq_repository.fetch_eligible(now, REPLAY_SCAN_BATCH).await?;
        if eligible_entries.is_empty() {
            return Ok(());
        }

        debug!("📤 [DLQ_REPLAY]: Retrying {} parked batches...", eligible_entries.len());

        for parked_entry in eligible_entries {
            let replay_batch: ExportBatch = match serde_json::from_value(parked_entry.payload.clone()) {
                Ok(batch) => batch,
                Err(decode_fault) => {
                    // Payload ilegible: se retira para no envenenar el ciclo.
                    warn!("💀 [DLQ_POISON]: Batch {} payload unreadable ({}); releasing.",
                        parked_entry.id, decode_fault);
                    let _ = self.dlq_repository.remove(&parked_entry.id).await;
                    continue;
                }
            };

            let sink_config = self.sink_router.config_for(parked_entry.destination);
            let body = match parked_entry.destination {
                SinkTarget::Splunk => build_splunk_body(&replay_batch),
                SinkTarget::Elastic => build_elastic_body(&replay_batch),
            };

            match dispatch_to_sink(&self.http_client, parked_entry.destination, &sink_config, body).await {
                SinkDispatch::Delivered => {
                    self.dlq_repository.remove(&parked_entry.id).await?;
                    self.metrics.record_dlq_replayed();
                    self.event_bus.emit_log(
                        "INFO",
                        "DLQ",
                        &format!("batch {} redelivered to {}", parked_entry.id, parked_entry.destination.label()),
                    );
                }
                SinkDispatch::Unconfigured => {
                    // Sin endpoint: el lote espera a la próxima ventana.
                    self.dlq_repository
                        .record_failed_attempt(
                            &parked_entry.id,
                            now,
                            now + ChronoDuration::milliseconds(self.replay_interval.as_millis() as i64),
                            "SINK_UNCONFIGURED",
                        )
                        .await?;
                }
                SinkDispatch::Failed(failure_detail) => {
                    self.dlq_repository
                        .record_failed_attempt(
                            &parked_entry.id,
                            now,
                            now + ChronoDuration::milliseconds(self.replay_interval.as_millis() as i64),
                            &failure_detail,
                        )
                        .await?;
                }
            }
        }

        Ok(())
    }
}
