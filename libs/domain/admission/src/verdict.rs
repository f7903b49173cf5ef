// [libs/domain/admission/src/verdict.rs]
/*!
 * =================================================================
 * APARATO: ADMISSION VERDICT ENGINE (V2.1)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: ALGORITMO DE ADMISIÓN EN SEIS PASOS
 * =================================================================
 */

use crate::allowlist::CompiledAllowlist;
use crate::bucket::TokenBucketCell;
use panoptes_domain_models::Source;
use std::net::IpAddr;

/// Motivo de rechazo, con su etiqueta de contrato HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Disabled,
    NoAllowlist,
    NotInAllowlist,
    RateLimited,
}

impl RejectReason {
    /// Etiqueta textual expuesta en la respuesta 429.
    pub fn reason_label(&self) -> &'static str {
        match self {
            RejectReason::Disabled => "blocked:disabled",
            RejectReason::NoAllowlist => "blocked:no_allowlist",
            RejectReason::NotInAllowlist => "blocked:not_in_allowlist",
            RejectReason::RateLimited => "rate_limited",
        }
    }

    /// Los rechazos de allowlist son 'blocked'; el exceso EPS es 'rate_limited'.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RejectReason::RateLimited)
    }
}

/// Veredicto final de admisión para una ráfaga entrante.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Admitido; 'over_cap' marca admisiones por encima del EPS configurado
    /// cuando la fuente no bloquea el exceso.
    Admitted { over_cap: bool },
    Rejected(RejectReason),
}

/// Resultado del dry-run administrativo (sin mutación de estado).
#[derive(Debug, Clone, serde::Serialize)]
pub struct AdmissionProbe {
    pub allowed: bool,
    pub reason: String,
    /// Bloque coincidente de prefijo más largo, si lo hubo.
    pub matched_cidr: Option<String>,
}

/**
 * Algoritmo de admisión para una ráfaga (source, client, record_count).
 *
 * Pasos del contrato:
 *   1. Fuente deshabilitada -> blocked:disabled.
 *   2. Allowlist vacía -> blocked:no_allowlist.
 *   3. Cliente fuera de la allowlist -> blocked:not_in_allowlist.
 *   4. Presupuesto EPS insuficiente -> rate_limited si la fuente bloquea;
 *      admisión con marca over_cap en caso contrario.
 *   5-6. El registro de last_seen y la admisión final los sella el caller.
 */
pub fn evaluate_admission(
    source: &Source,
    allowlist: &CompiledAllowlist,
    budget_cell: &TokenBucketCell,
    client_address: IpAddr,
    record_count: u32,
    now_ms: u64,
) -> AdmissionDecision {
    if !source.is_enabled() {
        return AdmissionDecision::Rejected(RejectReason::Disabled);
    }

    if allowlist.is_empty() {
        return AdmissionDecision::Rejected(RejectReason::NoAllowlist);
    }

    if !allowlist.permits(client_address) {
        return AdmissionDecision::Rejected(RejectReason::NotInAllowlist);
    }

    if source.max_eps == 0 {
        return AdmissionDecision::Admitted { over_cap: false };
    }

    if budget_cell.try_acquire(source.max_eps, record_count, now_ms) {
        return AdmissionDecision::Admitted { over_cap: false };
    }

    if source.block_on_exceed {
        AdmissionDecision::Rejected(RejectReason::RateLimited)
    } else {
        AdmissionDecision::Admitted { over_cap: true }
    }
}

/**
 * Dry-run de admisión para la UI administrativa.
 * Evalúa allowlist y estado sin tocar el presupuesto EPS.
 */
pub fn probe_admission(
    source: &Source,
    allowlist: &CompiledAllowlist,
    client_address: IpAddr,
) -> AdmissionProbe {
    if !source.is_enabled() {
        return AdmissionProbe {
            allowed: false,
            reason: RejectReason::Disabled.reason_label().to_string(),
            matched_cidr: None,
        };
    }

    if allowlist.is_empty() {
        return AdmissionProbe {
            allowed: false,
            reason: RejectReason::NoAllowlist.reason_label().to_string(),
            matched_cidr: None,
        };
    }

    match allowlist.longest_match(client_address) {
        Some(matched_network) => AdmissionProbe {
            allowed: true,
            reason: "allowed".to_string(),
            matched_cidr: Some(matched_network.to_string()),
        },
        None => AdmissionProbe {
            allowed: false,
            reason: RejectReason::NotInAllowlist.reason_label().to_string(),
            matched_cidr: None,
        },
    }
}
