// [libs/domain/admission/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ADMISSION CONTROL HUB (V2.2 - LOCK-FREE GOLD)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: VEREDICTOS DE ADMISIÓN POR FUENTE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. AUTHORITY DISCIPLINE: La allowlist de la fuente es la autoridad de
 *    admisión con independencia de su tipo declarado.
 * 2. LOCK-FREE BUDGET: El presupuesto EPS se descuenta mediante CAS sobre
 *    una palabra empaquetada (militokens, marca temporal).
 * 3. DRY-RUN PURITY: 'admission_test' jamás muta estado; es apto para la
 *    UI administrativa.
 * =================================================================
 */

pub mod allowlist;
pub mod bucket;
pub mod verdict;

pub use allowlist::CompiledAllowlist;
pub use bucket::TokenBucketCell;
pub use verdict::{evaluate_admission, probe_admission, AdmissionDecision, AdmissionProbe, RejectReason};
