// [libs/domain/models/src/metrics.rs]
/*!
 * =================================================================
 * APARATO: METRICS READ-MODEL CONTRACT (V3.1 - SNAPSHOT SYNC)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: INSTANTÁNEA ESTRUCTURADA DEL AGREGADOR DE MÉTRICAS
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Contadores monótonos del proceso.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterTotals {
    pub requests_total: u64,
    pub requests_failed: u64,
    pub records_processed: u64,
    pub batches_total: u64,
    pub threat_matches_total: u64,
    pub outputs_test_success_total: u64,
    pub outputs_test_fail_total: u64,
    pub udp_head_packets_total: u64,
    pub udp_head_bytes_total: u64,
    pub udp_decode_errors_total: u64,
    pub udp_dropped_total: u64,
    pub export_drops_total: u64,
    pub blocked_total: u64,
    pub rate_limited_total: u64,
    pub over_cap_total: u64,
    pub idempotent_replays_total: u64,
    pub dlq_appended_total: u64,
    pub dlq_replayed_total: u64,
}

/// Promedios sobre la ventana deslizante de 1 minuto.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowAverages {
    /// Eventos por segundo.
    pub eps_1m: f64,
    /// Lotes por minuto.
    pub bpm_1m: f64,
    /// Riesgo promedio de los registros del último minuto.
    pub avg_risk_1m: f64,
}

/// Percentiles de latencia del reservorio de muestras recientes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Series de 5 minutos para gráficas: pares [epoch_ms, valor].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSeries {
    pub events: Vec<(i64, f64)>,
    pub batches: Vec<(i64, f64)>,
    pub threat_matches: Vec<(i64, f64)>,
    pub avg_risk: Vec<(i64, f64)>,
}

/**
 * Instantánea estructurada devuelta por GET /v1/metrics.
 */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub totals: CounterTotals,
    pub averages: WindowAverages,
    pub latency: LatencyPercentiles,
    /// Fuentes con tráfico observado dentro de la ventana activa.
    pub active_sources: u64,
    /// Señal de contrapresión de los canales de exportación.
    pub backpressure: bool,
    pub series: MetricsSeries,
}
