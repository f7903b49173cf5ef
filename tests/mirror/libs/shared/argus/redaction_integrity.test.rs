/**
 * =================================================================
 * APARATO: REDACTION ENGINE INTEGRITY TEST (V1.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar el escudo por defecto y el descenso recursivo.
 * =================================================================
 */

use panoptes_shared_argus::redaction::{RedactionEngine, REDACTION_PLACEHOLDER};
use serde_json::json;

#[test]
fn certify_authorization_always_redacted() {
    // Escenario: el operador no declara ninguna lista. 'Authorization'
    // debe redactarse de todas formas.
    let engine = RedactionEngine::from_lists(&[], &[]);

    assert!(engine.is_header_redacted("Authorization"));
    assert!(engine.is_header_redacted("X-API-KEY"));
    assert_eq!(engine.redact_header_value("authorization", "Bearer abc"), REDACTION_PLACEHOLDER);
    assert_eq!(engine.redact_header_value("content-type", "application/json"), "application/json");
    println!("✅ REDACTION: default shield certified.");
}

#[test]
fn certify_deep_field_redaction() {
    let engine = RedactionEngine::from_lists(
        &["X-Internal-Token".to_string()],
        &["password".to_string(), "Api_Secret".to_string()],
    );

    let mut payload = json!({
        "collector_id": "edge-01",
        "password": "hunter2",
        "nested": {
            "api_secret": "zzz",
            "records": [ { "password": "again", "bytes": 10 } ]
        }
    });

    engine.redact_json_fields(&mut payload);

    assert_eq!(payload["password"], REDACTION_PLACEHOLDER);
    assert_eq!(payload["nested"]["api_secret"], REDACTION_PLACEHOLDER);
    assert_eq!(payload["nested"]["records"][0]["password"], REDACTION_PLACEHOLDER);
    // Los campos no listados sobreviven intactos.
    assert_eq!(payload["nested"]["records"][0]["bytes"], 10);
    assert_eq!(payload["collector_id"], "edge-01");
    println!("✅ REDACTION: recursive descent certified.");
}
