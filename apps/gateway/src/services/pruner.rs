// [apps/gateway/src/services/pruner.rs]
/*!
 * =================================================================
 * APARATO: HYGIENE REAPER SERVICE (V3.2)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: PODA DE AUDITORÍA, IDEMPOTENCIA Y TOUCHES
 *
 * # Performance:
 * El ciclo de 60 segundos está sintonizado para minimizar el jitter en
 * hilos de red mientras mantiene la RAM y el Ledger libres de residuo.
 * =================================================================
 */

use crate::state::audit_ring::AuditRing;
use crate::state::idempotency_vault::IdempotencyVault;
use crate::state::source_directory::SourceDirectory;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info};

/// Cadencia del podador.
const PRUNER_INTERVAL_SECONDS: u64 = 60;

/**
 * Despliega el daemon de higiene perpetua en el runtime.
 */
pub fn spawn_pruner(
    audit_ring: Arc<AuditRing>,
    idempotency_vault: Arc<IdempotencyVault>,
    source_directory: Arc<SourceDirectory>,
    mut shutdown_signal: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        info!("💀 [REAPER_ACTIVE]: Hygiene daemon initiated ({}s cadence).", PRUNER_INTERVAL_SECONDS);
        let mut maintenance_ticker = interval(Duration::from_secs(PRUNER_INTERVAL_SECONDS));

        loop {
            tokio::select! {
                _ = maintenance_ticker.tick() => {
                    // 1. PODA DEL ANILLO DE AUDITORÍA (TTL por entrada)
                    audit_ring.prune_expired(Utc::now());

                    // 2. PODA DEL LEDGER DE IDEMPOTENCIA (TTL + cota)
                    if let Err(prune_fault) = idempotency_vault.prune().await {
                        error!("💀 [REAPER_FAULT]: Idempotency prune failed: {}", prune_fault);
                    }

                    // 3. VOLCADO WRITE-BEHIND DE last_seen
                    source_directory.flush_touches().await;
                },
                _ = shutdown_signal.changed() => {
                    if *shutdown_signal.borrow() {
                        break;
                    }
                },
            }
        }

        info!("🛑 [REAPER]: Hygiene daemon offline.");
    });
}
