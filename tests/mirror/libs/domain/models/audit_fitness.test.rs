/**
 * =================================================================
 * APARATO: FITNESS RUBRIC INTEGRITY TEST (V1.2)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * OBJETIVO: Certificar la rúbrica de fitness y el clamp único final.
 * =================================================================
 */

use panoptes_domain_models::audit::{
    compute_fitness, fingerprint_api_key, TimelineEvent, TimelineStage,
};
use std::collections::HashMap;

fn event(stage: TimelineStage, meta: Option<serde_json::Value>) -> TimelineEvent {
    TimelineEvent {
        stage,
        offset_ms: 0,
        meta: meta.map(|value| {
            value
                .as_object()
                .expect("meta fixture must be an object")
                .iter()
                .map(|(key, val)| (key.clone(), val.clone()))
                .collect::<HashMap<_, _>>()
        }),
    }
}

#[test]
fn certify_healthy_request_scores_full_fitness() {
    let timeline = vec![
        event(TimelineStage::Received, None),
        event(TimelineStage::Validated, Some(serde_json::json!({"rejected_records": 0}))),
        event(TimelineStage::Enriched, None),
        event(TimelineStage::Completed, None),
    ];

    assert_eq!(compute_fitness(200, &timeline), 1.0);
    println!("✅ FITNESS: healthy request certified at 1.0.");
}

#[test]
fn certify_single_penalties() {
    // Validación fallida: 1.0 - 0.3
    let validation_failure = vec![event(
        TimelineStage::Validated,
        Some(serde_json::json!({"rejected_records": 3})),
    )];
    assert!((compute_fitness(207, &validation_failure) - 0.7).abs() < 1e-9);

    // Estado de error: 1.0 - 0.4
    assert!((compute_fitness(422, &[]) - 0.6).abs() < 1e-9);

    // Un sink fallido: 1.0 - 0.3
    let one_sink_down = vec![event(
        TimelineStage::Posthook,
        Some(serde_json::json!({"failed_sinks": ["splunk"]})),
    )];
    assert!((compute_fitness(200, &one_sink_down) - 0.7).abs() < 1e-9);
}

#[test]
fn certify_stacked_penalties_clamp_once_at_zero() {
    // Escenario límite: validación fallida + dos sinks caídos + estado 500.
    // Acumulado: 1.0 - 0.3 - 0.6 - 0.4 = -0.3; el clamp final lo lleva a 0.
    let worst_case_timeline = vec![
        event(TimelineStage::Validated, Some(serde_json::json!({"rejected_records": 10}))),
        event(
            TimelineStage::Exported,
            Some(serde_json::json!({"failed_sinks": ["splunk", "elastic"]})),
        ),
    ];

    assert_eq!(compute_fitness(500, &worst_case_timeline), 0.0);
    println!("✅ FITNESS: single-clamp discipline certified.");
}

#[test]
fn certify_api_key_fingerprint_shape() {
    assert_eq!(fingerprint_api_key("panoptes-admin-9f3k2"), "pan…3k2");
    // Claves cortas se ofuscan por completo: la huella jamás revela la clave.
    assert_eq!(fingerprint_api_key("short"), "***");
    assert_eq!(fingerprint_api_key(""), "***");
}
