// [apps/gateway/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY STATE ORCHESTRATOR (V4.3 - CAPABILITY HUB)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: IGNICIÓN Y ORQUESTACIÓN DE TODOS LOS ESTRATOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CAPABILITY INJECTION: Ningún singleton global; cada componente
 *    recibe sus manijas por capacidad desde este hub.
 * 2. WARMING GATE: El flag de preparación gobierna el 503 warming_up
 *    de las rutas no públicas hasta completar las migraciones.
 * 3. COMPOSITION ROOT: Centraliza repositorios, motores y buzones para
 *    la inyección en handlers y daemons.
 * =================================================================
 */

pub mod audit_ring;
pub mod idempotency_vault;
pub mod metrics_hub;
pub mod source_directory;

use crate::config::GatewayConfig;
use crate::middleware::{KeyRing, RpmLimiters};
use crate::services::event_bus::EventBus;
use crate::services::export::{ExportMailbox, SinkConfig, SinkRouter};
use crate::services::firewall::{FirewallPort, LogOnlyFirewall};
use crate::services::pipeline::IngestPipeline;
use audit_ring::AuditRing;
use idempotency_vault::IdempotencyVault;
use metrics_hub::MetricsHub;
use panoptes_domain_enrichment::{EnrichmentHub, GeoEngine, ThreatMatcher, ThreatSnapshot};
use panoptes_domain_models::FlowRecord;
use panoptes_infra_db::repositories::{
    DlqRepository, IdempotencyRepository, IndicatorRepository, SourceRepository,
};
use panoptes_infra_db::DbClient;
use panoptes_infra_netflow::BoundedQueue;
use panoptes_shared_argus::RedactionEngine;
use source_directory::{now_epoch_ms, SourceDirectory};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Capacidad de los buzones de exportación (lotes, no registros).
const EXPORT_MAILBOX_CAPACITY: usize = 256;

/**
 * Contenedor de estado compartido (thread-safe) del gateway.
 */
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub database_client: DbClient,

    // --- ESTADO EN RAM ---
    pub metrics: Arc<MetricsHub>,
    pub audit_ring: Arc<AuditRing>,
    pub idempotency_vault: Arc<IdempotencyVault>,
    pub source_directory: Arc<SourceDirectory>,

    // --- MOTORES DE DOMINIO ---
    pub enrichment: Arc<EnrichmentHub>,
    pub pipeline: Arc<IngestPipeline>,

    // --- SEÑALES Y EXPORTACIÓN ---
    pub event_bus: Arc<EventBus>,
    pub sink_router: Arc<SinkRouter>,
    pub splunk_mailbox: Arc<ExportMailbox>,
    pub elastic_mailbox: Arc<ExportMailbox>,

    // --- REPOSITORIOS DE AUTORIDAD ---
    pub dlq_repository: Arc<DlqRepository>,
    pub indicator_repository: Arc<IndicatorRepository>,

    // --- SEGURIDAD Y OBSERVABILIDAD ---
    pub key_ring: Arc<KeyRing>,
    pub rpm_limiters: Arc<RpmLimiters>,
    pub redaction: Arc<RedactionEngine>,
    pub firewall: Arc<dyn FirewallPort>,

    // --- CABEZAL UDP ---
    pub flow_queue: Arc<BoundedQueue<FlowRecord>>,

    // --- CICLO DE VIDA ---
    readiness_flag: Arc<AtomicBool>,
    pub boot_epoch_ms: u64,
}

impl AppState {
    /**
     * Ignición completa del estado: enlace al Ledger (migraciones
     * incluidas), siembra del feed de amenazas, hidratación de fuentes
     * y construcción de motores.
     *
     * El gateway permanece en 'warming_up' hasta 'mark_ready'.
     */
    #[instrument(skip(config))]
    pub async fn ignite(config: GatewayConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        // 1. LEDGER: conexión + migraciones idempotentes.
        let database_client =
            DbClient::connect(&config.database_url, config.database_token.clone()).await?;

        let source_repository = SourceRepository::new(database_client.clone());
        let indicator_repository =
            Arc::new(IndicatorRepository::new(database_client.clone()));
        let idempotency_repository = IdempotencyRepository::new(database_client.clone());
        let dlq_repository = Arc::new(DlqRepository::new(database_client.clone()));

        // 2. FEED DE AMENAZAS: siembra de fichero + snapshot desde el Ledger.
        if let Some(threatlist_path) = &config.threatlist_path {
            match tokio::fs::read_to_string(threatlist_path).await {
                Ok(feed_content) => {
                    indicator_repository.seed_from_lines(feed_content.lines()).await?;
                }
                Err(read_fault) => {
                    warn!("⚠️ [THREAT_SEED]: Feed file unreadable ({}); starting with persisted indicators only.", read_fault);
                }
            }
        }

        let threat_matcher = ThreatMatcher::empty();
        rebuild_threat_structures(&indicator_repository, &threat_matcher).await?;

        // 3. MOTOR GEO/ASN: lectores intercambiables.
        let geo_engine = GeoEngine::bootstrap(
            config.geoip_city_path.clone(),
            config.geoip_asn_path.clone(),
        );

        let enrichment = Arc::new(EnrichmentHub::new(geo_engine, threat_matcher));

        // 4. ESTADO EN RAM.
        let metrics = Arc::new(MetricsHub::new());
        let audit_ring = Arc::new(AuditRing::new(config.audit_ring_size, config.audit_ttl_sec));
        let idempotency_vault = Arc::new(IdempotencyVault::new(
            idempotency_repository,
            config.idempotency_ttl_sec,
            config.idempotency_max_entries,
        ));
        let source_directory = Arc::new(SourceDirectory::new(source_repository));
        source_directory.hydrate().await?;

        // 5. SEÑALES, BUZONES Y PIPELINE.
        let event_bus = Arc::new(EventBus::new());
        let sink_router = Arc::new(SinkRouter::new(
            SinkConfig {
                endpoint_url: config.splunk_url.clone(),
                auth_token: config.splunk_token.clone(),
            },
            SinkConfig {
                endpoint_url: config.elastic_url.clone(),
                auth_token: config.elastic_api_key.clone(),
            },
        ));
        let splunk_mailbox = Arc::new(ExportMailbox::new(EXPORT_MAILBOX_CAPACITY));
        let elastic_mailbox = Arc::new(ExportMailbox::new(EXPORT_MAILBOX_CAPACITY));

        let pipeline = Arc::new(IngestPipeline::new(
            Arc::clone(&enrichment),
            Arc::clone(&metrics),
            Arc::clone(&event_bus),
            Arc::clone(&splunk_mailbox),
            Arc::clone(&elastic_mailbox),
        ));

        // 6. SEGURIDAD Y OBSERVABILIDAD.
        let key_ring = Arc::new(KeyRing::from_config(&config));
        let rpm_limiters = Arc::new(RpmLimiters::from_config(&config));
        let redaction = Arc::new(RedactionEngine::from_lists(
            &config.redact_headers,
            &config.redact_fields,
        ));

        // 7. COLA DEL CABEZAL UDP.
        let flow_queue: Arc<BoundedQueue<FlowRecord>> =
            Arc::new(BoundedQueue::new(config.udp_queue_cap, config.udp_queue_policy));

        info!("🧬 [APP_STATE]: Gateway state ignition complete ({} sources cached).", source_directory.len());

        Ok(Self {
            config,
            database_client,
            metrics,
            audit_ring,
            idempotency_vault,
            source_directory,
            enrichment,
            pipeline,
            event_bus,
            sink_router,
            splunk_mailbox,
            elastic_mailbox,
            dlq_repository,
            indicator_repository,
            key_ring,
            rpm_limiters,
            redaction,
            firewall: Arc::new(LogOnlyFirewall),
            flow_queue,
            readiness_flag: Arc::new(AtomicBool::new(false)),
            boot_epoch_ms: now_epoch_ms(),
        })
    }

    /// Marca el fin del warming: las rutas no públicas quedan abiertas.
    pub fn mark_ready(&self) {
        self.readiness_flag.store(true, Ordering::Release);
        info!("✅ [APP_STATE]: Warming complete; gateway serving all strata.");
    }

    pub fn is_ready(&self) -> bool {
        self.readiness_flag.load(Ordering::Acquire)
    }

    /**
     * Reconstruye las estructuras de amenaza desde el Ledger y las
     * instala con swap atómico (mutación de indicadores o SIGHUP).
     */
    pub async fn rebuild_threat_snapshot(&self) -> anyhow::Result<()> {
        rebuild_threat_structures(&self.indicator_repository, self.enrichment.intel()).await
    }
}

async fn rebuild_threat_structures(
    indicator_repository: &Arc<IndicatorRepository>,
    threat_matcher: &ThreatMatcher,
) -> anyhow::Result<()> {
    let persisted_indicators = indicator_repository.fetch_all().await?;

    let mut rebuilt_snapshot = ThreatSnapshot::empty();
    for indicator in &persisted_indicators {
        rebuilt_snapshot.ingest(indicator.kind, &indicator.value);
    }

    threat_matcher.install(rebuilt_snapshot);
    Ok(())
}
