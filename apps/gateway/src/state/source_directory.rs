// [apps/gateway/src/state/source_directory.rs]
/*!
 * =================================================================
 * APARATO: SOURCE DIRECTORY (V4.2 - ADMISSION FRONTLINE)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: CACHÉ DE FUENTES, CUBOS EPS Y VEREDICTOS DE ADMISIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. RWLOCK REGISTRY: Lecturas por petición, escrituras raras (API
 *    administrativa); el cerrojo de lectura jamás se retiene en await.
 * 2. COMPILED SOURCES: Allowlist parseada y cubo de tokens viven junto
 *    a la entidad; solo la mutación administrativa recompila la entrada
 *    (y con ella el cubo); el sellado de last_seen muta in situ.
 * 3. WRITE-BEHIND: last_seen se acumula en RAM y se vuelca al Ledger
 *    en ráfagas del flusher, protegiendo el camino caliente.
 * =================================================================
 */

use chrono::{DateTime, Duration, Utc};
use panoptes_domain_admission::{
    evaluate_admission, probe_admission, AdmissionDecision, AdmissionProbe, CompiledAllowlist,
    TokenBucketCell,
};
use panoptes_domain_models::{ObservedOrigin, Source};
use panoptes_infra_db::repositories::SourceRepository;
use panoptes_infra_db::DbError;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{info, instrument, warn};

/// Ventana de actividad para el conteo de fuentes activas (5 minutos).
const ACTIVE_SOURCE_WINDOW_SECONDS: i64 = 300;

/// Fuente compilada: entidad + estructuras de admisión precalculadas.
/// El cubo EPS sobrevive a los sellados de last_seen; solo una mutación
/// administrativa lo reconstruye.
pub struct CompiledSource {
    identity: RwLock<Source>,
    allowlist: CompiledAllowlist,
    budget_cell: TokenBucketCell,
}

impl CompiledSource {
    /// Copia instantánea de la entidad para listados y respuestas.
    pub fn snapshot(&self) -> Source {
        self.identity.read().expect("FATAL: source identity lock poisoned.").clone()
    }

    pub fn allowlist(&self) -> &CompiledAllowlist {
        &self.allowlist
    }
}

/// Veredicto de admisión del directorio para una ráfaga entrante.
pub enum DirectoryVerdict {
    Admitted { tenant_id: String, over_cap: bool },
    Rejected { reason: &'static str, rate_limited: bool },
    UnknownSource,
}

/**
 * Directorio de fuentes: la autoridad de admisión del gateway.
 */
pub struct SourceDirectory {
    repository: SourceRepository,
    compiled_cache: RwLock<HashMap<String, Arc<CompiledSource>>>,
    /// Observaciones last_seen pendientes de volcado (write-behind).
    pending_touches: Mutex<HashMap<String, (DateTime<Utc>, ObservedOrigin)>>,
}

impl SourceDirectory {
    pub fn new(repository: SourceRepository) -> Self {
        Self {
            repository,
            compiled_cache: RwLock::new(HashMap::new()),
            pending_touches: Mutex::new(HashMap::new()),
        }
    }

    /**
     * Hidrata la caché completa desde el Ledger (arranque).
     */
    #[instrument(skip(self))]
    pub async fn hydrate(&self) -> Result<usize, DbError> {
        let persisted_sources = self.repository.fetch_all().await?;
        let hydrated_count = persisted_sources.len();

        let mut cache_guard =
            self.compiled_cache.write().expect("FATAL: source cache lock poisoned.");
        cache_guard.clear();
        for source in persisted_sources {
            cache_guard.insert(source.id.clone(), Arc::new(compile_source(source)));
        }
        drop(cache_guard);

        info!("🗂️ [SOURCE_DIRECTORY]: Hydrated {} sources into the admission cache.", hydrated_count);
        Ok(hydrated_count)
    }

    /**
     * Alta o mutación administrativa: persiste y recompila la entrada.
     */
    pub async fn upsert(&self, source: Source) -> Result<(), DbError> {
        self.repository.upsert_source(&source).await?;

        let source_id = source.id.clone();
        let compiled_entry = Arc::new(compile_source(source));
        let mut cache_guard =
            self.compiled_cache.write().expect("FATAL: source cache lock poisoned.");
        cache_guard.insert(source_id, compiled_entry);
        Ok(())
    }

    pub async fn delete(&self, source_id: &str) -> Result<(), DbError> {
        self.repository.delete_source(source_id).await?;
        let mut cache_guard =
            self.compiled_cache.write().expect("FATAL: source cache lock poisoned.");
        cache_guard.remove(source_id);
        Ok(())
    }

    pub fn resolve(&self, source_id: &str) -> Option<Arc<CompiledSource>> {
        let cache_guard =
            self.compiled_cache.read().expect("FATAL: source cache lock poisoned.");
        cache_guard.get(source_id).cloned()
    }

    pub fn list(&self) -> Vec<Source> {
        let cache_guard =
            self.compiled_cache.read().expect("FATAL: source cache lock poisoned.");
        let mut listing: Vec<Source> =
            cache_guard.values().map(|compiled| compiled.snapshot()).collect();
        listing.sort_by(|left, right| left.id.cmp(&right.id));
        listing
    }

    pub fn len(&self) -> usize {
        self.compiled_cache.read().expect("FATAL: source cache lock poisoned.").len()
    }

    /**
     * Algoritmo de admisión completo para una ráfaga entrante.
     * Sella la observación last_seen en el buffer write-behind al admitir.
     */
    pub fn admit(
        &self,
        source_id: &str,
        client_address: IpAddr,
        record_count: u32,
        observed_origin: ObservedOrigin,
        now_ms: u64,
    ) -> DirectoryVerdict {
        let Some(compiled) = self.resolve(source_id) else {
            return DirectoryVerdict::UnknownSource;
        };

        let decision = {
            let identity_guard =
                compiled.identity.read().expect("FATAL: source identity lock poisoned.");
            evaluate_admission(
                &identity_guard,
                &compiled.allowlist,
                &compiled.budget_cell,
                client_address,
                record_count,
                now_ms,
            )
        };

        match decision {
            AdmissionDecision::Admitted { over_cap } => {
                self.record_touch(source_id, observed_origin);
                let tenant_id = compiled
                    .identity
                    .read()
                    .expect("FATAL: source identity lock poisoned.")
                    .tenant_id
                    .clone();
                DirectoryVerdict::Admitted { tenant_id, over_cap }
            }
            AdmissionDecision::Rejected(reject_reason) => DirectoryVerdict::Rejected {
                reason: reject_reason.reason_label(),
                rate_limited: reject_reason.is_rate_limited(),
            },
        }
    }

    /// Dry-run administrativo sin mutación de estado.
    pub fn probe(&self, source_id: &str, client_address: IpAddr) -> Option<AdmissionProbe> {
        let compiled = self.resolve(source_id)?;
        let identity_guard =
            compiled.identity.read().expect("FATAL: source identity lock poisoned.");
        Some(probe_admission(&identity_guard, &compiled.allowlist, client_address))
    }

    /// Etiqueta del contrato para fuentes desconocidas.
    pub fn unknown_source_reason() -> &'static str {
        "blocked:unknown_source"
    }

    fn record_touch(&self, source_id: &str, observed_origin: ObservedOrigin) {
        let mut touches_guard =
            self.pending_touches.lock().expect("FATAL: touch buffer lock poisoned.");
        touches_guard.insert(source_id.to_string(), (Utc::now(), observed_origin));
    }

    /**
     * Vuelca las observaciones last_seen acumuladas al Ledger y a la
     * caché, sin reconstruir cubos EPS. Invocado por el flusher.
     */
    pub async fn flush_touches(&self) -> usize {
        let drained_touches: Vec<(String, (DateTime<Utc>, ObservedOrigin))> = {
            let mut touches_guard =
                self.pending_touches.lock().expect("FATAL: touch buffer lock poisoned.");
            touches_guard.drain().collect()
        };

        let flushed_count = drained_touches.len();

        for (source_id, (observed_at, observed_origin)) in drained_touches {
            if let Err(flush_fault) = self
                .repository
                .touch_last_seen(&source_id, observed_at, observed_origin)
                .await
            {
                warn!("⚠️ [TOUCH_FLUSH]: last_seen seal failed for {}: {}", source_id, flush_fault);
                continue;
            }

            if let Some(compiled) = self.resolve(&source_id) {
                let mut identity_guard =
                    compiled.identity.write().expect("FATAL: source identity lock poisoned.");
                identity_guard.last_seen = Some(observed_at);
                identity_guard.observed_origin = observed_origin;
            }
        }

        flushed_count
    }

    /// Fuentes con tráfico observado dentro de la ventana activa.
    pub fn active_source_count(&self) -> u64 {
        let activity_threshold = Utc::now() - Duration::seconds(ACTIVE_SOURCE_WINDOW_SECONDS);

        let pending_guard =
            self.pending_touches.lock().expect("FATAL: touch buffer lock poisoned.");
        let cache_guard =
            self.compiled_cache.read().expect("FATAL: source cache lock poisoned.");

        cache_guard
            .values()
            .filter(|compiled| {
                let identity_guard =
                    compiled.identity.read().expect("FATAL: source identity lock poisoned.");
                pending_guard.contains_key(&identity_guard.id)
                    || identity_guard
                        .last_seen
                        .map(|seen| seen > activity_threshold)
                        .unwrap_or(false)
            })
            .count() as u64
    }

    /// Unión de allowlists de fuentes habilitadas (sync de firewall).
    pub fn allowlist_union(&self) -> (usize, Vec<String>) {
        let cache_guard =
            self.compiled_cache.read().expect("FATAL: source cache lock poisoned.");

        let mut contributing_sources = 0usize;
        let mut union_blocks: Vec<String> = Vec::new();

        for compiled in cache_guard.values() {
            let is_enabled = compiled
                .identity
                .read()
                .expect("FATAL: source identity lock poisoned.")
                .is_enabled();
            if !is_enabled || compiled.allowlist.is_empty() {
                continue;
            }
            contributing_sources += 1;
            for block in compiled.allowlist.render_blocks() {
                if !union_blocks.contains(&block) {
                    union_blocks.push(block);
                }
            }
        }

        union_blocks.sort();
        (contributing_sources, union_blocks)
    }
}

fn compile_source(source: Source) -> CompiledSource {
    let (allowlist, rejected_blocks) = CompiledAllowlist::compile(&source.allowed_ips);
    if !rejected_blocks.is_empty() {
        warn!(
            "⚠️ [SOURCE_COMPILE]: Source {} carries {} unparseable CIDR blocks: {:?}",
            source.id,
            rejected_blocks.len(),
            rejected_blocks
        );
    }

    CompiledSource {
        budget_cell: TokenBucketCell::new_full(source.max_eps, now_epoch_ms()),
        allowlist,
        identity: RwLock::new(source),
    }
}

/// Milisegundos epoch del reloj de pared (marca para los cubos EPS).
pub fn now_epoch_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
