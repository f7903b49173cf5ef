// [libs/domain/models/src/tests_contracts.rs]
/**
 * =================================================================
 * APARATO: DOMAIN CONTRACT TEST (V3.0 - INTEGRATION LEVEL)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN DE PARIDAD JSON DE LOS CONTRATOS
 *
 * # Mathematical Proof (Wire Parity):
 * Los sinks aguas abajo consumen el registro enriquecido como JSON plano.
 * El test certifica que el aplanado serde del registro canónico dentro
 * del enriquecido no altere nombres ni pierda estratos anulables.
 * =================================================================
 */
