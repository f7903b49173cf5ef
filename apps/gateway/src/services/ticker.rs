// [apps/gateway/src/services/ticker.rs]
/*!
 * =================================================================
 * APARATO: METRICS PACEMAKER (V3.0 - 1 HZ DISCIPLINE)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: AVANCE DEL ANILLO DE VENTANAS UNA VEZ POR SEGUNDO
 * =================================================================
 */

use crate::services::pipeline::IngestPipeline;
use crate::state::metrics_hub::MetricsHub;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::info;

/**
 * Despliega el marcapasos de métricas: sella una ranura por segundo de
 * pared y refresca la señal de contrapresión de los buzones.
 *
 * Los segundos saltados por pausas del runtime aparecen como ranuras
 * en cero; el sellado nunca fusiona conteos entre segundos.
 */
pub fn spawn_metrics_ticker(
    metrics: Arc<MetricsHub>,
    pipeline: Arc<IngestPipeline>,
    mut shutdown_signal: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        info!("⏱️  [METRICS_TICKER]: 1 Hz window pacemaker online.");
        let mut second_ticker = interval(Duration::from_secs(1));
        second_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = second_ticker.tick() => {
                    metrics.roll_window(Utc::now().timestamp());
                    pipeline.refresh_backpressure_flag();
                },
                _ = shutdown_signal.changed() => {
                    if *shutdown_signal.borrow() {
                        break;
                    }
                },
            }
        }

        info!("🛑 [METRICS_TICKER]: Pacemaker offline.");
    });
}
