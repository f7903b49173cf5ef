// [libs/infra/netflow/src/template.rs]
/*!
 * =================================================================
 * APARATO: TEMPLATE CACHE STRATA (V2.2)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: MEMORIA DE PLANTILLAS V9/IPFIX ENTRE DATAGRAMAS
 * =================================================================
 */

use std::collections::HashMap;

// Elementos de información del registro de datos (taxonomía IANA compartida
// entre NetFlow v9 e IPFIX para el conjunto común).
pub const IE_IN_BYTES: u16 = 1;
pub const IE_IN_PKTS: u16 = 2;
pub const IE_PROTOCOL: u16 = 4;
pub const IE_L4_SRC_PORT: u16 = 7;
pub const IE_IPV4_SRC_ADDR: u16 = 8;
pub const IE_L4_DST_PORT: u16 = 11;
pub const IE_IPV4_DST_ADDR: u16 = 12;
pub const IE_IPV6_SRC_ADDR: u16 = 27;
pub const IE_IPV6_DST_ADDR: u16 = 28;

/// Especificación de un campo dentro de una plantilla.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Identificador del elemento de información (sin bit de empresa).
    pub element_id: u16,
    /// Longitud del campo en bytes dentro del registro de datos.
    pub length: u16,
    /// Campo de empresa privada: se omite por longitud, nunca se interpreta.
    pub is_enterprise: bool,
}

/// Plantilla aprendida de un exportador.
#[derive(Debug, Clone)]
pub struct TemplateRecord {
    pub template_id: u16,
    pub fields: Vec<FieldSpec>,
}

impl TemplateRecord {
    /// Longitud total en bytes de un registro de datos de esta plantilla.
    pub fn record_length(&self) -> usize {
        self.fields.iter().map(|field| field.length as usize).sum()
    }
}

/**
 * Caché de plantillas indexada por (dominio de observación, template id).
 *
 * El dominio de observación aísla exportadores que reutilizan ids de
 * plantilla; v9 usa 'source_id', IPFIX 'observation domain id'.
 */
#[derive(Debug, Default)]
pub struct TemplateCache {
    learned_templates: HashMap<(u32, u16), TemplateRecord>,
}

impl TemplateCache {
    pub fn learn(&mut self, observation_domain: u32, template: TemplateRecord) {
        self.learned_templates.insert((observation_domain, template.template_id), template);
    }

    pub fn resolve(&self, observation_domain: u32, template_id: u16) -> Option<&TemplateRecord> {
        self.learned_templates.get(&(observation_domain, template_id))
    }

    pub fn len(&self) -> usize {
        self.learned_templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.learned_templates.is_empty()
    }
}
