// [libs/shared/argus/src/redaction.rs]
/*!
 * =================================================================
 * APARATO: AUDIT REDACTION ENGINE (V2.0 - STARTUP LIST)
 * CLASIFICACIÓN: SHARED UTILITY (ESTRATO L4)
 * RESPONSABILIDAD: SUSTITUCIÓN DE SECRETOS ANTES DE CUALQUIER PERSISTENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. STARTUP LIST: La lista de cabeceras y campos se fija en el arranque;
 *    no existe introspección en tiempo de ejecución.
 * 2. DEFAULT SHIELD: 'authorization' y 'x-api-key' se redactan siempre,
 *    aunque el operador no los declare.
 * 3. DEEP WALK: La redacción de campos desciende recursivamente por
 *    objetos y arreglos del payload auditado.
 * =================================================================
 */

use serde_json::Value;
use std::collections::HashSet;

/// Marcador fijo que sustituye a todo valor redactado.
pub const REDACTION_PLACEHOLDER: &str = "[REDACTED]";

/// Cabeceras blindadas con independencia de la configuración del operador.
const ALWAYS_REDACTED_HEADERS: &[&str] = &["authorization", "x-api-key"];

/**
 * Motor de redacción con listas fijadas en el arranque.
 */
#[derive(Debug, Clone)]
pub struct RedactionEngine {
    redacted_header_names: HashSet<String>,
    redacted_field_names: HashSet<String>,
}

impl RedactionEngine {
    /**
     * Construye el motor a partir de las listas del entorno
     * (REDACT_HEADERS / REDACT_FIELDS, separadas por comas).
     */
    pub fn from_lists(header_list: &[String], field_list: &[String]) -> Self {
        let mut redacted_header_names: HashSet<String> = header_list
            .iter()
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect();

        for mandatory_header in ALWAYS_REDACTED_HEADERS {
            redacted_header_names.insert((*mandatory_header).to_string());
        }

        let redacted_field_names: HashSet<String> = field_list
            .iter()
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect();

        Self { redacted_header_names, redacted_field_names }
    }

    /// Decide si una cabecera debe ofuscarse (comparación case-insensitive).
    pub fn is_header_redacted(&self, header_name: &str) -> bool {
        self.redacted_header_names.contains(&header_name.to_ascii_lowercase())
    }

    /// Devuelve el valor a almacenar para una cabecera dada.
    pub fn redact_header_value<'a>(&self, header_name: &str, raw_value: &'a str) -> &'a str {
        if self.is_header_redacted(header_name) {
            REDACTION_PLACEHOLDER
        } else {
            raw_value
        }
    }

    /**
     * Redacta in situ todos los campos listados dentro de un payload JSON.
     * Desciende por objetos y arreglos; los escalares se dejan intactos.
     */
    pub fn redact_json_fields(&self, payload: &mut Value) {
        if self.redacted_field_names.is_empty() {
            return;
        }
        self.walk_value(payload);
    }

    fn walk_value(&self, node: &mut Value) {
        match node {
            Value::Object(object_map) => {
                for (field_name, field_value) in object_map.iter_mut() {
                    if self.redacted_field_names.contains(&field_name.to_ascii_lowercase()) {
                        *field_value = Value::String(REDACTION_PLACEHOLDER.to_string());
                    } else {
                        self.walk_value(field_value);
                    }
                }
            }
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.walk_value(item);
                }
            }
            _ => {}
        }
    }
}
