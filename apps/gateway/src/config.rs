// [apps/gateway/src/config.rs]
/*!
 * =================================================================
 * APARATO: ENVIRONMENT CAPTURE MODULE (V4.1 - FULL OPTION TABLE)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: CAPTURA TIPADA DE LA CONFIGURACIÓN DE ENTORNO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE CAPTURE: El entorno se lee una sola vez al arranque; el
 *    resto del proceso recibe la configuración por capacidad.
 * 2. SAFE DEFAULTS: Toda opción ausente degrada a un valor operable;
 *    ninguna variable malformada tumba la ignición.
 * =================================================================
 */

use panoptes_infra_netflow::OverflowPolicy;
use std::env;
use std::path::PathBuf;

/// Configuración completa del gateway, capturada del entorno.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    // --- RED ---
    pub http_port: u16,
    pub udp_port: u16,

    // --- PERSISTENCIA ---
    pub database_url: String,
    pub database_token: Option<String>,

    // --- ENRIQUECIMIENTO ---
    pub geoip_city_path: Option<PathBuf>,
    pub geoip_asn_path: Option<PathBuf>,
    pub threatlist_path: Option<PathBuf>,

    // --- SEGURIDAD ---
    pub admin_keys: Vec<String>,
    pub user_keys: Vec<String>,
    pub allow_dev_keys: bool,
    pub redact_headers: Vec<String>,
    pub redact_fields: Vec<String>,

    // --- LÍMITES GLOBALES DE PETICIÓN ---
    pub rate_limit_ingest_rpm: u32,
    pub rate_limit_default_rpm: u32,

    // --- ANILLO DE AUDITORÍA (C10) ---
    pub audit_ring_size: usize,
    pub audit_ttl_sec: i64,

    // --- EXPORTACIÓN Y DLQ (C9) ---
    pub export_batch_max: usize,
    pub export_flush_ms: u64,
    pub export_retry_max: u32,
    pub dlq_retention_sec: i64,
    pub dlq_replay_ms: u64,
    pub splunk_url: Option<String>,
    pub splunk_token: Option<String>,
    pub elastic_url: Option<String>,
    pub elastic_api_key: Option<String>,

    // --- CABEZAL UDP (C6) ---
    pub udp_queue_cap: usize,
    pub udp_queue_policy: OverflowPolicy,
    pub udp_source_label: String,

    // --- IDEMPOTENCIA (C5) ---
    pub idempotency_ttl_sec: i64,
    pub idempotency_max_entries: u64,

    // --- SUBSISTEMAS OPCIONALES ---
    pub feature_sources: bool,
    pub feature_udp_head: bool,

    // --- CICLO DE VIDA ---
    pub request_timeout_sec: u64,
    pub shutdown_grace_sec: u64,
}

impl GatewayConfig {
    /**
     * Captura la configuración desde el entorno del proceso.
     */
    pub fn capture() -> Self {
        Self {
            http_port: read_parsed("APP_PORT", 8080),
            udp_port: read_parsed("UDP_PORT", 2055),

            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "panoptes.db".to_string()),
            database_token: env::var("TURSO_AUTH_TOKEN").ok().filter(|token| !token.is_empty()),

            geoip_city_path: read_path("GEOIP_DB_CITY"),
            geoip_asn_path: read_path("GEOIP_DB_ASN"),
            threatlist_path: read_path("THREATLIST_CSV"),

            admin_keys: read_list("ADMIN_KEYS"),
            user_keys: read_list("USER_KEYS"),
            allow_dev_keys: read_flag("ALLOW_DEV_KEYS", false),
            redact_headers: read_list("REDACT_HEADERS"),
            redact_fields: read_list("REDACT_FIELDS"),

            rate_limit_ingest_rpm: read_parsed("RATE_LIMIT_INGEST_RPM", 0),
            rate_limit_default_rpm: read_parsed("RATE_LIMIT_DEFAULT_RPM", 0),

            audit_ring_size: read_parsed("AUDIT_RING_SIZE", 10_000),
            audit_ttl_sec: read_parsed("AUDIT_TTL_SEC", 86_400),

            export_batch_max: read_parsed("EXPORT_BATCH_MAX", 2_000),
            export_flush_ms: read_parsed("EXPORT_FLUSH_MS", 1_500),
            export_retry_max: read_parsed("EXPORT_RETRY_MAX", 3),
            dlq_retention_sec: read_parsed("DLQ_RETENTION_SEC", 7 * 24 * 3_600),
            dlq_replay_ms: read_parsed("DLQ_REPLAY_MS", 60_000),
            splunk_url: env::var("SPLUNK_HEC_URL").ok().filter(|value| !value.is_empty()),
            splunk_token: env::var("SPLUNK_HEC_TOKEN").ok().filter(|value| !value.is_empty()),
            elastic_url: env::var("ELASTIC_URL").ok().filter(|value| !value.is_empty()),
            elastic_api_key: env::var("ELASTIC_API_KEY").ok().filter(|value| !value.is_empty()),

            udp_queue_cap: read_parsed("UDP_QUEUE_CAP", 10_000),
            udp_queue_policy: OverflowPolicy::parse(
                &env::var("UDP_QUEUE_POLICY").unwrap_or_default(),
            ),
            udp_source_label: env::var("UDP_SOURCE_LABEL").unwrap_or_else(|_| "udp".to_string()),

            idempotency_ttl_sec: read_parsed("IDEMPOTENCY_TTL_SEC", 86_400),
            idempotency_max_entries: read_parsed("IDEMPOTENCY_MAX_ENTRIES", 50_000),

            feature_sources: read_flag("FEATURE_SOURCES", true),
            feature_udp_head: read_flag("FEATURE_UDP_HEAD", true),

            request_timeout_sec: read_parsed("HTTP_REQUEST_TIMEOUT_SEC", 30),
            shutdown_grace_sec: read_parsed("SHUTDOWN_GRACE_SEC", 10),
        }
    }

    /**
     * Configuración hermética para los arneses de prueba: Ledger en RAM,
     * claves dev habilitadas y cabezal UDP apagado.
     */
    pub fn for_tests() -> Self {
        Self {
            http_port: 0,
            udp_port: 0,
            database_url: ":memory:".to_string(),
            database_token: None,
            geoip_city_path: None,
            geoip_asn_path: None,
            threatlist_path: None,
            admin_keys: Vec::new(),
            user_keys: Vec::new(),
            allow_dev_keys: true,
            redact_headers: Vec::new(),
            redact_fields: Vec::new(),
            rate_limit_ingest_rpm: 0,
            rate_limit_default_rpm: 0,
            audit_ring_size: 1_000,
            audit_ttl_sec: 86_400,
            export_batch_max: 100,
            export_flush_ms: 100,
            export_retry_max: 3,
            dlq_retention_sec: 7 * 24 * 3_600,
            dlq_replay_ms: 60_000,
            splunk_url: None,
            splunk_token: None,
            elastic_url: None,
            elastic_api_key: None,
            udp_queue_cap: 100,
            udp_queue_policy: OverflowPolicy::DropNewest,
            udp_source_label: "udp".to_string(),
            idempotency_ttl_sec: 86_400,
            idempotency_max_entries: 1_000,
            feature_sources: true,
            feature_udp_head: false,
            request_timeout_sec: 30,
            shutdown_grace_sec: 1,
        }
    }
}

// --- LECTORES DE ENTORNO LAXOS ---

fn read_parsed<T: std::str::FromStr>(variable_name: &str, default_value: T) -> T {
    env::var(variable_name)
        .ok()
        .and_then(|raw_value| raw_value.trim().parse::<T>().ok())
        .unwrap_or(default_value)
}

fn read_flag(variable_name: &str, default_value: bool) -> bool {
    match env::var(variable_name) {
        Ok(raw_value) => matches!(
            raw_value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default_value,
    }
}

fn read_list(variable_name: &str) -> Vec<String> {
    env::var(variable_name)
        .unwrap_or_default()
        .split(',')
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn read_path(variable_name: &str) -> Option<PathBuf> {
    env::var(variable_name)
        .ok()
        .filter(|raw_path| !raw_path.trim().is_empty())
        .map(PathBuf::from)
}
