// [apps/gateway/src/state/idempotency_vault.rs]
/*!
 * =================================================================
 * APARATO: IDEMPOTENCY VAULT (V3.2 - INFLIGHT COORDINATION)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: REPLAY DE RESPUESTAS Y COORDINACIÓN DE CARRERAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. RACE DISCIPLINE: Un 'begin' concurrente sobre la misma clave en
 *    vuelo espera en un Notify por clave hasta el commit del primario.
 * 2. CANCELLATION SAFETY: El guard del primario limpia su ranura al
 *    caer sin commit; los esperantes despiertan y reintentan como
 *    primarios sin caché negativa.
 * 3. NEGATIVE TTL: Un commit con estado >= 500 memoriza con TTL corto
 *    para no fosilizar fallos transitorios.
 * =================================================================
 */

use chrono::{Duration, Utc};
use panoptes_infra_db::repositories::idempotency::StoredResponse;
use panoptes_infra_db::repositories::IdempotencyRepository;
use panoptes_infra_db::DbError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::debug;

/// TTL reducido de los resultados negativos (estado >= 500).
const NEGATIVE_RESULT_TTL_SECONDS: i64 = 60;

type VaultKey = (String, String, String);

/// Resultado de 'begin' para una clave de idempotencia.
pub enum BeginOutcome {
    /// El caller es el primario; debe ejecutar y luego 'commit'.
    Fresh(InflightGuard),
    /// Replay: respuesta memorizada byte-idéntica de una petición previa.
    Replay(StoredResponse),
}

struct VaultShared {
    inflight_slots: Mutex<HashMap<VaultKey, Arc<Notify>>>,
}

/**
 * Bóveda de idempotencia: persistencia vía repositorio + coordinación
 * en RAM de claves en vuelo.
 */
pub struct IdempotencyVault {
    repository: IdempotencyRepository,
    shared: Arc<VaultShared>,
    ttl_seconds: i64,
    max_entries: u64,
}

impl IdempotencyVault {
    pub fn new(repository: IdempotencyRepository, ttl_seconds: i64, max_entries: u64) -> Self {
        Self {
            repository,
            shared: Arc::new(VaultShared { inflight_slots: Mutex::new(HashMap::new()) }),
            ttl_seconds,
            max_entries,
        }
    }

    /**
     * Abre la transacción idempotente para la clave con alcance
     * (tenant, endpoint, client_key).
     *
     * # Errors:
     * Propaga fallos del Ledger; la coordinación en RAM no falla.
     */
    pub async fn begin(
        &self,
        tenant_id: &str,
        endpoint: &str,
        client_key: &str,
    ) -> Result<BeginOutcome, DbError> {
        let vault_key: VaultKey =
            (tenant_id.to_string(), endpoint.to_string(), client_key.to_string());

        loop {
            // 1. REPLAY: respuesta ya memorizada dentro del TTL.
            if let Some(stored_response) = self
                .repository
                .fetch(tenant_id, endpoint, client_key, Utc::now())
                .await?
            {
                return Ok(BeginOutcome::Replay(stored_response));
            }

            // 2. RESERVA DE RANURA: el primer caller se vuelve primario.
            let existing_slot = {
                let mut slots_guard = self
                    .shared
                    .inflight_slots
                    .lock()
                    .expect("FATAL: inflight slots lock poisoned.");

                match slots_guard.get(&vault_key) {
                    Some(occupied_slot) => Some(Arc::clone(occupied_slot)),
                    None => {
                        slots_guard.insert(vault_key.clone(), Arc::new(Notify::new()));
                        None
                    }
                }
            };

            match existing_slot {
                None => {
                    return Ok(BeginOutcome::Fresh(InflightGuard {
                        shared: Arc::clone(&self.shared),
                        vault_key,
                        committed: false,
                    }));
                }
                Some(inflight_notify) => {
                    // 3. ESPERA COOPERATIVA: el primario sella o cancela.
                    // La espera es acotada: un notify_waiters emitido entre la
                    // liberación del cerrojo y este await no puede colgarnos.
                    debug!("⏳ [IDEMPOTENCY]: Waiting on in-flight primary for key {:?}.", vault_key);
                    let _ = tokio::time::timeout(
                        std::time::Duration::from_millis(250),
                        inflight_notify.notified(),
                    )
                    .await;
                    // Reintento completo: replay si hubo commit; primario
                    // nuevo si el anterior fue cancelado.
                }
            }
        }
    }

    /**
     * Sella la respuesta del primario y despierta a los esperantes.
     */
    pub async fn commit(
        &self,
        guard: InflightGuard,
        response_status: u16,
        response_body: &str,
    ) -> Result<(), DbError> {
        let (tenant_id, endpoint, client_key) = guard.vault_key.clone();

        let ttl_seconds = if response_status >= 500 {
            NEGATIVE_RESULT_TTL_SECONDS
        } else {
            self.ttl_seconds
        };

        self.repository
            .store(
                &tenant_id,
                &endpoint,
                &client_key,
                response_status,
                response_body,
                Utc::now() + Duration::seconds(ttl_seconds),
            )
            .await?;

        guard.release();
        Ok(())
    }

    /// Poda periódica del Ledger (TTL primero, cota después).
    pub async fn prune(&self) -> Result<(), DbError> {
        self.repository.prune(Utc::now(), self.max_entries).await?;
        Ok(())
    }
}

/**
 * Testigo del primario en vuelo. Al caer sin commit (cancelación o
 * pánico del handler), libera la ranura y despierta a los esperantes
 * sin dejar caché negativa.
 */
pub struct InflightGuard {
    shared: Arc<VaultShared>,
    vault_key: VaultKey,
    committed: bool,
}

impl InflightGuard {
    /// Liberación explícita tras el commit.
    fn release(mut self) {
        self.committed = true;
        self.wake_waiters();
    }

    fn wake_waiters(&self) {
        let mut slots_guard = self
            .shared
            .inflight_slots
            .lock()
            .expect("FATAL: inflight slots lock poisoned.");

        if let Some(inflight_notify) = slots_guard.remove(&self.vault_key) {
            inflight_notify.notify_waiters();
        }
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if !self.committed {
            // Cancelación del primario: ranura liberada, sin caché negativa.
            self.wake_waiters();
        }
    }
}
