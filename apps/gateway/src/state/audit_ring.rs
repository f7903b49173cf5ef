// [apps/gateway/src/state/audit_ring.rs]
/*!
 * =================================================================
 * APARATO: REQUEST AUDIT RING (V4.0 - ETAG + TAIL STREAM)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: ANILLO ACOTADO DE AUDITORÍA CON TTL Y CONSULTAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. BOUNDED MEMORY: Capacidad M con desalojo de cabeza; TTL por
 *    entrada aplicado por el podador cada 60 s.
 * 2. STABLE ETAG: Derivado de (última modificación de la ventana
 *    filtrada, total de coincidencias): estable sin tráfico nuevo.
 * 3. SEQUENCE TAIL: Toda entrada recibe una secuencia monótona que
 *    habilita la reanudación Last-Event-ID del stream.
 * =================================================================
 */

use chrono::{DateTime, Duration, Utc};
use panoptes_domain_models::AuditEntry;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::info;

/// Rutas de monitoreo excluibles en las consultas del operador.
const MONITORING_PATHS: &[&str] = &["/v1/health", "/v1/version", "/v1/metrics"];

/// Filtros de la consulta de auditoría.
#[derive(Debug, Default, Clone)]
pub struct AuditQuery {
    pub method: Option<String>,
    /// Clase de estado: 2 => 2xx, 4 => 4xx, 5 => 5xx.
    pub status_class: Option<u16>,
    pub path_contains: Option<String>,
    pub client_address: Option<String>,
    pub tenant_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub exclude_monitoring_paths: bool,
    pub limit: usize,
    pub offset: usize,
}

/// Página de resultados con su ETag estable.
#[derive(Debug, Clone)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub total_matching: usize,
    pub etag: String,
}

#[derive(Debug, Default)]
struct RingInner {
    entries: VecDeque<AuditEntry>,
    next_sequence: u64,
}

/**
 * Anillo de auditoría en RAM, única estructura dueña de las entradas.
 */
pub struct AuditRing {
    inner: Mutex<RingInner>,
    capacity: usize,
    ttl_seconds: i64,
}

impl AuditRing {
    pub fn new(capacity: usize, ttl_seconds: i64) -> Self {
        Self {
            inner: Mutex::new(RingInner { entries: VecDeque::new(), next_sequence: 1 }),
            capacity: capacity.max(1),
            ttl_seconds: ttl_seconds.max(1),
        }
    }

    /**
     * Anexa la entrada de una petición completada, asignando su
     * secuencia monótona. Desaloja la cabeza si la capacidad se excede.
     */
    pub fn append(&self, mut entry: AuditEntry) -> AuditEntry {
        let mut inner_guard = self.inner.lock().expect("FATAL: audit ring lock poisoned.");

        entry.sequence = inner_guard.next_sequence;
        inner_guard.next_sequence += 1;

        inner_guard.entries.push_back(entry.clone());
        if inner_guard.entries.len() > self.capacity {
            inner_guard.entries.pop_front();
        }

        entry
    }

    /// Retira entradas más viejas que el TTL. Invocado por el podador.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let expiration_threshold = now - Duration::seconds(self.ttl_seconds);
        let mut inner_guard = self.inner.lock().expect("FATAL: audit ring lock poisoned.");

        let before_count = inner_guard.entries.len();
        inner_guard.entries.retain(|entry| entry.timestamp > expiration_threshold);
        let pruned_count = before_count - inner_guard.entries.len();

        if pruned_count > 0 {
            info!("💀 [AUDIT_PRUNE]: Evicted {} expired audit entries.", pruned_count);
        }
        pruned_count
    }

    /**
     * Consulta filtrada con paginación y ETag estable.
     */
    pub fn query(&self, query: &AuditQuery) -> AuditPage {
        let inner_guard = self.inner.lock().expect("FATAL: audit ring lock poisoned.");

        let matching_entries: Vec<&AuditEntry> = inner_guard
            .entries
            .iter()
            .filter(|entry| entry_matches(entry, query))
            .collect();

        let total_matching = matching_entries.len();

        // ETag: última modificación de la ventana + total de coincidencias.
        let last_modified_ms = matching_entries
            .last()
            .map(|entry| entry.timestamp.timestamp_millis())
            .unwrap_or(0);
        let etag = compute_etag(last_modified_ms, total_matching);

        let page_limit = if query.limit == 0 { 50 } else { query.limit };
        let page_entries: Vec<AuditEntry> = matching_entries
            .iter()
            .rev() // las más recientes primero
            .skip(query.offset)
            .take(page_limit)
            .map(|entry| (*entry).clone())
            .collect();

        AuditPage { entries: page_entries, total_matching, etag }
    }

    pub fn get(&self, trace_id: &str) -> Option<AuditEntry> {
        let inner_guard = self.inner.lock().expect("FATAL: audit ring lock poisoned.");
        inner_guard
            .entries
            .iter()
            .find(|entry| entry.trace_id == trace_id)
            .cloned()
    }

    /// Entradas posteriores a la secuencia dada (reanudación del stream).
    pub fn entries_after(&self, after_sequence: u64, limit: usize) -> Vec<AuditEntry> {
        let inner_guard = self.inner.lock().expect("FATAL: audit ring lock poisoned.");
        inner_guard
            .entries
            .iter()
            .filter(|entry| entry.sequence > after_sequence)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("FATAL: audit ring lock poisoned.").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn entry_matches(entry: &AuditEntry, query: &AuditQuery) -> bool {
    // El observador no se observa: las lecturas del propio anillo quedan
    // fuera de la ventana consultada; de lo contrario cada consulta
    // mutaría el ETag que debe permanecer estable.
    if entry.method.eq_ignore_ascii_case("GET") && entry.path.starts_with("/v1/admin/requests") {
        return false;
    }

    if let Some(method_filter) = &query.method {
        if !entry.method.eq_ignore_ascii_case(method_filter) {
            return false;
        }
    }

    if let Some(status_class) = query.status_class {
        if entry.status / 100 != status_class {
            return false;
        }
    }

    if let Some(path_fragment) = &query.path_contains {
        if !entry.path.contains(path_fragment.as_str()) {
            return false;
        }
    }

    if let Some(client_filter) = &query.client_address {
        if !entry.client_address.starts_with(client_filter.as_str()) {
            return false;
        }
    }

    if let Some(tenant_filter) = &query.tenant_id {
        if entry.tenant_id.as_deref() != Some(tenant_filter.as_str()) {
            return false;
        }
    }

    if let Some(window_start) = query.since {
        if entry.timestamp < window_start {
            return false;
        }
    }

    if let Some(window_end) = query.until {
        if entry.timestamp > window_end {
            return false;
        }
    }

    if query.exclude_monitoring_paths && MONITORING_PATHS.contains(&entry.path.as_str()) {
        return false;
    }

    true
}

fn compute_etag(last_modified_ms: i64, total_matching: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(last_modified_ms.to_be_bytes());
    hasher.update((total_matching as u64).to_be_bytes());
    let digest = hasher.finalize();
    format!("\"{}\"", hex::encode(&digest[..16]))
}
