// [apps/gateway/src/services/event_bus.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY EVENT BUS (V4.0 - SSE BROADCASTER)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: DIFUSIÓN DE ENTRADAS DE AUDITORÍA Y LOGS ESTRUCTURADOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. LOCK-FREE EMISSION: La pérdida de un suscriptor jamás afecta al
 *    reactor principal; el despacho es O(1) respecto de los receptores.
 * 2. DUAL STREAM: Un único canal transporta los dos flujos de eventos
 *    (cola de auditoría y logs); cada endpoint SSE filtra su variante.
 * 3. CONGESTION AUDIT: El conteo de suscriptores se analiza en cada
 *    ráfaga para detectar estados de ceguera del operador.
 * =================================================================
 */

use chrono::Utc;
use panoptes_domain_models::AuditEntry;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

/// Capacidad del canal de difusión.
/// Sintonizada para absorber ráfagas sin disparar errores de 'Lagging'.
const BROADCAST_CHANNEL_CAPACITY: usize = 4_096;

/// Trama de log estructurado para el stream del operador.
#[derive(Debug, Clone, Serialize)]
pub struct LogFrame {
    pub id: String,
    pub timestamp: String,
    pub level: String,
    pub stratum: String,
    pub message: String,
}

/// Señales difundidas a los enlaces SSE del operador.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    AuditAppended(AuditEntry),
    LogEmitted(LogFrame),
}

/**
 * Orquestador central de señales en tiempo real del gateway.
 */
#[derive(Debug, Clone)]
pub struct EventBus {
    internal_transmission_channel: broadcast::Sender<GatewayEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);
        Self { internal_transmission_channel: sender }
    }

    /// Genera un receptor nuevo para un túnel SSE.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.internal_transmission_channel.subscribe()
    }

    /// Difunde la entrada de auditoría recién sellada en el anillo.
    pub fn emit_audit_entry(&self, sealed_entry: AuditEntry) {
        self.dispatch(GatewayEvent::AuditAppended(sealed_entry));
    }

    /**
     * Inyecta una trama en el flujo de logs unificado y la refleja en
     * el rastro del proceso según su severidad.
     */
    pub fn emit_log(&self, level: &str, stratum: &str, message: &str) {
        match level {
            "ERROR" | "CRITICAL" => error!(target: "panoptes_stream", "[{}] {}", stratum, message),
            "WARN" => warn!(target: "panoptes_stream", "[{}] {}", stratum, message),
            _ => debug!(target: "panoptes_stream", "[{}] {}", stratum, message),
        }

        self.dispatch(GatewayEvent::LogEmitted(LogFrame {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            level: level.to_string(),
            stratum: stratum.to_string(),
            message: message.to_string(),
        }));
    }

    /**
     * Motor interno de despacho con auditoría de congestión.
     * Sin suscriptores activos el mensaje se descarta en silencio.
     */
    fn dispatch(&self, event_artifact: GatewayEvent) {
        match self.internal_transmission_channel.send(event_artifact) {
            Ok(subscriber_count) => {
                trace!("📡 [EVENT_BUS]: Signal broadcasted to {} active links.", subscriber_count);
            }
            Err(_) => {
                // Sin receptores activos: nadie observa, el evento se descarta.
                trace!("💤 [EVENT_BUS]: Signal discarded. No active operator links.");
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
