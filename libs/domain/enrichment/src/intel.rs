// [libs/domain/enrichment/src/intel.rs]
/*!
 * =================================================================
 * APARATO: THREAT INTEL MATCHER (V3.0 - SNAPSHOT SWAP)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: CARGA DE INDICADORES Y COINCIDENCIA IP/DOMINIO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DUAL STRUCTURE: Tries LPM por familia para CIDRs y conjunto hash
 *    para dominios exactos, reconstruidos juntos en cada recarga.
 * 2. SNAPSHOT SWAP: Los lectores observan un snapshot inmutable tras
 *    una manija atómica; la recarga jamás los bloquea.
 * 3. LENIENT LOAD: Comentarios, líneas vacías y CIDRs malformados se
 *    descartan con contabilidad, sin abortar la carga.
 * =================================================================
 */

use crate::trie::PrefixTrie;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use panoptes_domain_models::indicator::{Indicator, IndicatorKind};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Snapshot inmutable de las estructuras de coincidencia.
#[derive(Debug)]
pub struct ThreatSnapshot {
    ipv4_trie: PrefixTrie,
    ipv6_trie: PrefixTrie,
    exact_domains: HashSet<String>,
    /// Entradas descartadas por sintaxis durante la construcción.
    pub rejected_lines: usize,
    pub built_at: DateTime<Utc>,
}

impl ThreatSnapshot {
    pub fn empty() -> Self {
        Self {
            ipv4_trie: PrefixTrie::new(),
            ipv6_trie: PrefixTrie::new(),
            exact_domains: HashSet::new(),
            rejected_lines: 0,
            built_at: Utc::now(),
        }
    }

    /**
     * Construye el snapshot desde líneas del formato del fichero de
     * amenazas: CIDRs, 'domain:<nombre>', comentarios '#'.
     */
    pub fn from_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Self {
        let mut snapshot = Self::empty();

        for raw_line in lines {
            let Some((indicator_kind, indicator_value)) = Indicator::parse_line(raw_line) else {
                continue;
            };
            snapshot.ingest(indicator_kind, &indicator_value);
        }

        snapshot
    }

    /// Incorpora un indicador individual al snapshot en construcción.
    pub fn ingest(&mut self, indicator_kind: IndicatorKind, indicator_value: &str) {
        match indicator_kind {
            IndicatorKind::Domain => {
                self.exact_domains.insert(indicator_value.to_ascii_lowercase());
            }
            IndicatorKind::Cidr => match indicator_value.parse::<IpNetwork>() {
                Ok(IpNetwork::V4(network)) => {
                    self.ipv4_trie.insert(
                        &network.network().octets(),
                        network.prefix(),
                        network.to_string(),
                    );
                }
                Ok(IpNetwork::V6(network)) => {
                    self.ipv6_trie.insert(
                        &network.network().octets(),
                        network.prefix(),
                        network.to_string(),
                    );
                }
                Err(_) => {
                    warn!("⚠️ [THREAT_LOAD]: Discarding malformed CIDR line: {}", indicator_value);
                    self.rejected_lines += 1;
                }
            },
        }
    }

    pub fn cidr_count(&self) -> usize {
        self.ipv4_trie.len() + self.ipv6_trie.len()
    }

    pub fn domain_count(&self) -> usize {
        self.exact_domains.len()
    }
}

/// Estado observable del matcher para /system.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ThreatStatus {
    pub cidr_indicators: usize,
    pub domain_indicators: usize,
    pub rejected_lines: usize,
    pub built_at: DateTime<Utc>,
}

/**
 * Matcher de amenazas con recarga por intercambio atómico.
 */
pub struct ThreatMatcher {
    active_snapshot: ArcSwap<ThreatSnapshot>,
}

impl ThreatMatcher {
    pub fn new(initial_snapshot: ThreatSnapshot) -> Self {
        Self { active_snapshot: ArcSwap::from_pointee(initial_snapshot) }
    }

    pub fn empty() -> Self {
        Self::new(ThreatSnapshot::empty())
    }

    /// Instala un snapshot reconstruido; los lectores en vuelo no se bloquean.
    pub fn install(&self, rebuilt_snapshot: ThreatSnapshot) {
        info!(
            "🔄 [THREAT_SWAP]: Installing snapshot with {} CIDRs / {} domains ({} rejected lines).",
            rebuilt_snapshot.cidr_count(),
            rebuilt_snapshot.domain_count(),
            rebuilt_snapshot.rejected_lines
        );
        self.active_snapshot.store(Arc::new(rebuilt_snapshot));
    }

    /**
     * CIDRs que cubren la dirección, prefijo más largo primero.
     * Entrada inválida o snapshot vacío devuelven el vector vacío.
     */
    pub fn match_ip(&self, address: IpAddr) -> Vec<String> {
        let snapshot_guard = self.active_snapshot.load();
        match address {
            IpAddr::V4(v4_address) => snapshot_guard.ipv4_trie.covering_prefixes(&v4_address.octets()),
            IpAddr::V6(v6_address) => snapshot_guard.ipv6_trie.covering_prefixes(&v6_address.octets()),
        }
    }

    /// Dominios exactos coincidentes (a lo sumo uno en la v1 del contrato).
    pub fn match_domain(&self, domain_name: &str) -> Vec<String> {
        let normalized_name = domain_name.trim().trim_end_matches('.').to_ascii_lowercase();
        let snapshot_guard = self.active_snapshot.load();

        if snapshot_guard.exact_domains.contains(&normalized_name) {
            vec![normalized_name]
        } else {
            Vec::new()
        }
    }

    pub fn status(&self) -> ThreatStatus {
        let snapshot_guard = self.active_snapshot.load();
        ThreatStatus {
            cidr_indicators: snapshot_guard.cidr_count(),
            domain_indicators: snapshot_guard.domain_count(),
            rejected_lines: snapshot_guard.rejected_lines,
            built_at: snapshot_guard.built_at,
        }
    }
}
