// [apps/gateway/src/state/metrics_hub.rs]
/*!
 * =================================================================
 * APARATO: METRICS AGGREGATION HUB (V4.2 - WINDOW RING MASTER)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: CONTADORES, VENTANAS DESLIZANTES Y PERCENTILES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. HOT-PATH ATOMICS: Los contadores monótonos son atómicos puros; el
 *    camino de ingesta jamás toma el cerrojo de ventanas.
 * 2. TICKER DISCIPLINE: El anillo de 300 ranuras avanza exactamente una
 *    vez por segundo de pared; los segundos saltados producen ranuras
 *    en cero, nunca fusiones.
 * 3. SNAPSHOT READS: Los lectores reciben una instantánea completa bajo
 *    un cerrojo breve; jamás observan estado intermedio.
 * =================================================================
 */

use panoptes_domain_models::metrics::{
    CounterTotals, LatencyPercentiles, MetricsSeries, MetricsSnapshot, WindowAverages,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Longitud del anillo de ventanas: 300 ranuras de 1 segundo (5 minutos).
const WINDOW_RING_SLOTS: usize = 300;
/// Ranuras que componen la ventana de promedios de 1 minuto.
const ONE_MINUTE_SLOTS: usize = 60;
/// Capacidad del reservorio de muestras de latencia.
const LATENCY_RESERVOIR_CAPACITY: usize = 1_024;

/// Acumulador de un segundo de pared.
#[derive(Debug, Default, Clone, Copy)]
struct SecondSlot {
    events: u64,
    batches: u64,
    threat_matches: u64,
    risk_sum: u64,
    risk_count: u64,
}

/// Estado de las ventanas deslizantes, gobernado por el ticker.
#[derive(Debug, Default)]
struct WindowState {
    /// Ranuras selladas: (epoch_sec, acumulado de ese segundo).
    ring: VecDeque<(i64, SecondSlot)>,
    /// Acumulador del segundo en curso.
    accumulating: SecondSlot,
    /// Último segundo sellado por el ticker; 0 = aún sin sellar.
    last_sealed_epoch: i64,
}

/**
 * Agregador central de métricas del gateway.
 */
#[derive(Debug, Default)]
pub struct MetricsHub {
    // --- CONTADORES MONÓTONOS ---
    requests_total: AtomicU64,
    requests_failed: AtomicU64,
    records_processed: AtomicU64,
    batches_total: AtomicU64,
    threat_matches_total: AtomicU64,
    outputs_test_success_total: AtomicU64,
    outputs_test_fail_total: AtomicU64,
    udp_head_packets_total: AtomicU64,
    udp_head_bytes_total: AtomicU64,
    udp_decode_errors_total: AtomicU64,
    udp_dropped_total: AtomicU64,
    export_drops_total: AtomicU64,
    blocked_total: AtomicU64,
    rate_limited_total: AtomicU64,
    over_cap_total: AtomicU64,
    idempotent_replays_total: AtomicU64,
    dlq_appended_total: AtomicU64,
    dlq_replayed_total: AtomicU64,

    // --- VENTANAS Y RESERVORIO ---
    windows: Mutex<WindowState>,
    latency_reservoir: Mutex<VecDeque<f64>>,

    // --- SEÑALES DE SALUD ---
    backpressure_flag: AtomicBool,
    udp_socket_bound: AtomicBool,
    /// Epoch ms del último datagrama; 0 = ninguno desde el arranque.
    last_packet_epoch_ms: AtomicU64,
}

impl MetricsHub {
    pub fn new() -> Self {
        Self::default()
    }

    // --- CAMINO DE PETICIONES HTTP ---

    pub fn record_request(&self, status: u16, latency_ms: f64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if status >= 500 {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }

        let mut reservoir_guard =
            self.latency_reservoir.lock().expect("FATAL: latency reservoir lock poisoned.");
        if reservoir_guard.len() == LATENCY_RESERVOIR_CAPACITY {
            reservoir_guard.pop_front();
        }
        reservoir_guard.push_back(latency_ms);
    }

    // --- CAMINO DE LOTES (C7) ---

    /**
     * Sella un lote procesado: totales atómicos + acumulador del segundo.
     */
    pub fn record_batch(
        &self,
        record_count: u64,
        threat_matched_records: u64,
        risk_sum: u64,
    ) {
        self.records_processed.fetch_add(record_count, Ordering::Relaxed);
        self.batches_total.fetch_add(1, Ordering::Relaxed);
        self.threat_matches_total.fetch_add(threat_matched_records, Ordering::Relaxed);

        let mut windows_guard = self.windows.lock().expect("FATAL: windows lock poisoned.");
        windows_guard.accumulating.events += record_count;
        windows_guard.accumulating.batches += 1;
        windows_guard.accumulating.threat_matches += threat_matched_records;
        windows_guard.accumulating.risk_sum += risk_sum;
        windows_guard.accumulating.risk_count += record_count;
    }

    // --- CAMINO DEL CABEZAL UDP (C6) ---

    pub fn record_udp_packet(&self, byte_count: u64, now_epoch_ms: u64) {
        self.udp_head_packets_total.fetch_add(1, Ordering::Relaxed);
        self.udp_head_bytes_total.fetch_add(byte_count, Ordering::Relaxed);
        self.last_packet_epoch_ms.store(now_epoch_ms, Ordering::Relaxed);
    }

    pub fn record_udp_decode_error(&self) {
        self.udp_decode_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_udp_drops(&self, dropped_count: u64) {
        self.udp_dropped_total.fetch_add(dropped_count, Ordering::Relaxed);
    }

    pub fn set_udp_socket_bound(&self, is_bound: bool) {
        self.udp_socket_bound.store(is_bound, Ordering::Relaxed);
    }

    /**
     * Salud del cabezal: socket enlazado y (paquete fresco o silencio
     * total desde el arranque).
     */
    pub fn udp_head_running(&self, now_epoch_ms: u64, freshness_window_ms: u64) -> bool {
        if !self.udp_socket_bound.load(Ordering::Relaxed) {
            return false;
        }
        let last_packet = self.last_packet_epoch_ms.load(Ordering::Relaxed);
        last_packet == 0 || now_epoch_ms.saturating_sub(last_packet) <= freshness_window_ms
    }

    pub fn last_packet_epoch_ms(&self) -> u64 {
        self.last_packet_epoch_ms.load(Ordering::Relaxed)
    }

    // --- CONTADORES NOMINALES DE ADMISIÓN Y RESILIENCIA ---

    pub fn record_blocked(&self) {
        self.blocked_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_over_cap(&self) {
        self.over_cap_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_export_drop(&self) {
        self.export_drops_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idempotent_replay(&self) {
        self.idempotent_replays_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outputs_test(&self, probe_succeeded: bool) {
        if probe_succeeded {
            self.outputs_test_success_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.outputs_test_fail_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_dlq_appended(&self) {
        self.dlq_appended_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dlq_replayed(&self) {
        self.dlq_replayed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_backpressure(&self, is_active: bool) {
        self.backpressure_flag.store(is_active, Ordering::Relaxed);
    }

    pub fn backpressure_active(&self) -> bool {
        self.backpressure_flag.load(Ordering::Relaxed)
    }

    // --- TICKER (1 HZ) ---

    /**
     * Sella el segundo en curso en el anillo. Invocado por el ticker una
     * vez por segundo de pared; los segundos saltados por pausas del
     * runtime se rellenan con ranuras en cero.
     */
    pub fn roll_window(&self, now_epoch_sec: i64) {
        let mut windows_guard = self.windows.lock().expect("FATAL: windows lock poisoned.");

        if windows_guard.last_sealed_epoch != 0 {
            let mut gap_second = windows_guard.last_sealed_epoch + 1;
            while gap_second < now_epoch_sec {
                windows_guard.ring.push_back((gap_second, SecondSlot::default()));
                if windows_guard.ring.len() > WINDOW_RING_SLOTS {
                    windows_guard.ring.pop_front();
                }
                gap_second += 1;
            }
        }

        if now_epoch_sec > windows_guard.last_sealed_epoch {
            let sealed_slot = std::mem::take(&mut windows_guard.accumulating);
            windows_guard.ring.push_back((now_epoch_sec, sealed_slot));
            if windows_guard.ring.len() > WINDOW_RING_SLOTS {
                windows_guard.ring.pop_front();
            }
            windows_guard.last_sealed_epoch = now_epoch_sec;
        }
    }

    // --- LECTURAS ---

    pub fn totals(&self) -> CounterTotals {
        CounterTotals {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            records_processed: self.records_processed.load(Ordering::Relaxed),
            batches_total: self.batches_total.load(Ordering::Relaxed),
            threat_matches_total: self.threat_matches_total.load(Ordering::Relaxed),
            outputs_test_success_total: self.outputs_test_success_total.load(Ordering::Relaxed),
            outputs_test_fail_total: self.outputs_test_fail_total.load(Ordering::Relaxed),
            udp_head_packets_total: self.udp_head_packets_total.load(Ordering::Relaxed),
            udp_head_bytes_total: self.udp_head_bytes_total.load(Ordering::Relaxed),
            udp_decode_errors_total: self.udp_decode_errors_total.load(Ordering::Relaxed),
            udp_dropped_total: self.udp_dropped_total.load(Ordering::Relaxed),
            export_drops_total: self.export_drops_total.load(Ordering::Relaxed),
            blocked_total: self.blocked_total.load(Ordering::Relaxed),
            rate_limited_total: self.rate_limited_total.load(Ordering::Relaxed),
            over_cap_total: self.over_cap_total.load(Ordering::Relaxed),
            idempotent_replays_total: self.idempotent_replays_total.load(Ordering::Relaxed),
            dlq_appended_total: self.dlq_appended_total.load(Ordering::Relaxed),
            dlq_replayed_total: self.dlq_replayed_total.load(Ordering::Relaxed),
        }
    }

    /**
     * Instantánea estructurada completa para GET /v1/metrics.
     */
    pub fn snapshot(&self, active_sources: u64) -> MetricsSnapshot {
        let totals = self.totals();
        let latency = self.latency_percentiles();
        let (averages, series) = self.window_read_model();

        MetricsSnapshot {
            totals,
            averages,
            latency,
            active_sources,
            backpressure: self.backpressure_active(),
            series,
        }
    }

    fn latency_percentiles(&self) -> LatencyPercentiles {
        let reservoir_guard =
            self.latency_reservoir.lock().expect("FATAL: latency reservoir lock poisoned.");

        if reservoir_guard.is_empty() {
            return LatencyPercentiles::default();
        }

        let mut sorted_samples: Vec<f64> = reservoir_guard.iter().copied().collect();
        sorted_samples.sort_by(|left, right| left.partial_cmp(right).unwrap_or(std::cmp::Ordering::Equal));

        LatencyPercentiles {
            p50_ms: percentile_by_index(&sorted_samples, 0.50),
            p95_ms: percentile_by_index(&sorted_samples, 0.95),
            p99_ms: percentile_by_index(&sorted_samples, 0.99),
        }
    }

    fn window_read_model(&self) -> (WindowAverages, MetricsSeries) {
        let windows_guard = self.windows.lock().expect("FATAL: windows lock poisoned.");

        let mut series = MetricsSeries::default();
        for (epoch_sec, slot) in windows_guard.ring.iter() {
            let epoch_ms = epoch_sec * 1_000;
            series.events.push((epoch_ms, slot.events as f64));
            series.batches.push((epoch_ms, slot.batches as f64));
            series.threat_matches.push((epoch_ms, slot.threat_matches as f64));
            let slot_avg_risk = if slot.risk_count > 0 {
                slot.risk_sum as f64 / slot.risk_count as f64
            } else {
                0.0
            };
            series.avg_risk.push((epoch_ms, slot_avg_risk));
        }

        let recent_slots: Vec<&SecondSlot> = windows_guard
            .ring
            .iter()
            .rev()
            .take(ONE_MINUTE_SLOTS)
            .map(|(_, slot)| slot)
            .collect();

        let minute_events: u64 = recent_slots.iter().map(|slot| slot.events).sum();
        let minute_batches: u64 = recent_slots.iter().map(|slot| slot.batches).sum();
        let minute_risk_sum: u64 = recent_slots.iter().map(|slot| slot.risk_sum).sum();
        let minute_risk_count: u64 = recent_slots.iter().map(|slot| slot.risk_count).sum();

        let averages = WindowAverages {
            eps_1m: minute_events as f64 / ONE_MINUTE_SLOTS as f64,
            bpm_1m: minute_batches as f64,
            avg_risk_1m: if minute_risk_count > 0 {
                minute_risk_sum as f64 / minute_risk_count as f64
            } else {
                0.0
            },
        };

        (averages, series)
    }
}

/// Percentil por orden e índice: ceil(q*n)-1 sobre la muestra ordenada.
fn percentile_by_index(sorted_samples: &[f64], quantile: f64) -> f64 {
    let sample_count = sorted_samples.len();
    let index = ((quantile * sample_count as f64).ceil() as usize)
        .saturating_sub(1)
        .min(sample_count - 1);
    sorted_samples[index]
}
