// [libs/shared/argus/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ARGUS OBSERVABILITY CORE (V5.0 - GATEWAY MASTER)
 * CLASIFICACIÓN: SHARED UTILITY (ESTRATO L4/L6)
 * RESPONSABILIDAD: TRAZADO, TRAMPA DE PÁNICOS Y MOTOR DE REDACCIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ONE CRATE, ONE LENS: Lo que el gateway emite (trazas, pánicos) y
 *    lo que oculta (redacción de auditoría) comparten este estrato,
 *    de modo que anillo y stream de logs apliquen la misma lista.
 * 2. QUIET TABLE: El ruido de infraestructura se silencia desde una
 *    tabla declarativa, no desde una cadena de formato opaca.
 * 3. PANIC TRAP: Un colapso en cualquier tarea deja coordenadas y
 *    detalle en el rastro antes de la terminación del proceso.
 * =================================================================
 */

pub mod redaction;

pub use redaction::RedactionEngine;

use std::any::Any;
use std::panic;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Dependencias cuyo parloteo se degrada por defecto.
const QUIET_DEPENDENCY_TARGETS: &[(&str, &str)] = &[
    ("tower_http", "warn"),
    ("hyper", "warn"),
    ("libsql", "error"),
];

/// Inicializa el trazado del proceso y arma la trampa de pánicos.
///
/// RUST_LOG manda cuando está presente; en su ausencia el dominio
/// propio queda en debug (desarrollo) o info (producción) y la tabla
/// de silencio gobierna al resto.
///
/// # Errors:
/// Produce pánico si otro suscriptor global ya fue inicializado.
pub fn init_tracing(service_name: &str) {
    let level_filter = resolve_level_filter(service_name);

    // Producción emite JSON plano para agregadores; desarrollo emite
    // formato compacto para el operador humano.
    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(level_filter)
            .with(fmt::layer().compact().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(level_filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    }

    arm_panic_trap(service_name.to_string());

    info!("👁️  [ARGUS]: Observability online for [{}]; panic trap armed.", service_name);
}

/// RUST_LOG explícito o, en su defecto, la directiva compuesta
/// dominio + tabla de silencio.
fn resolve_level_filter(service_name: &str) -> EnvFilter {
    if let Ok(operator_filter) = EnvFilter::try_from_default_env() {
        return operator_filter;
    }

    let own_domain_level = if cfg!(debug_assertions) { "debug" } else { "info" };
    let mut directive_chain = format!("{}={}", service_name, own_domain_level);
    for (noisy_target, ceiling) in QUIET_DEPENDENCY_TARGETS {
        directive_chain.push(',');
        directive_chain.push_str(noisy_target);
        directive_chain.push('=');
        directive_chain.push_str(ceiling);
    }

    EnvFilter::new(directive_chain)
}

/// Hook global: todo pánico (incluidos los de tareas secundarias como
/// workers de exportación o el cabezal UDP) queda en el rastro antes
/// de la defunción del hilo.
fn arm_panic_trap(service_name: String) {
    panic::set_hook(Box::new(move |panic_report| {
        let crash_site = match panic_report.location() {
            Some(site) => format!("{}:{}:{}", site.file(), site.line(), site.column()),
            None => "<no coordinates>".to_string(),
        };

        error!(
            target: "panic_trap",
            service = %service_name,
            site = %crash_site,
            "💥 [PANIC_TRAP]: Task collapsed. Detail: {}",
            describe_panic_payload(panic_report.payload())
        );
    }));
}

/// Extrae el texto del payload de pánico sin suponer su tipo concreto.
fn describe_panic_payload(payload: &dyn Any) -> String {
    if let Some(static_text) = payload.downcast_ref::<&str>() {
        (*static_text).to_string()
    } else if let Some(owned_text) = payload.downcast_ref::<String>() {
        owned_text.clone()
    } else {
        "<non-textual panic payload>".to_string()
    }
}
