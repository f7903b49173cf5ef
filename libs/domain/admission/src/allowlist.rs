// [libs/domain/admission/src/allowlist.rs]
/*!
 * =================================================================
 * APARATO: CIDR ALLOWLIST COMPILER (V2.0)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: COMPILACIÓN Y COINCIDENCIA DE BLOQUES AUTORIZADOS
 * =================================================================
 */

use ipnetwork::IpNetwork;
use std::net::IpAddr;

/**
 * Allowlist compilada: bloques CIDR parseados una sola vez por fuente.
 *
 * El desempate entre bloques coincidentes usa el prefijo más largo;
 * entre empates exactos el orden de inserción es irrelevante porque
 * cualquier coincidencia basta para admitir.
 */
#[derive(Debug, Clone, Default)]
pub struct CompiledAllowlist {
    authorized_networks: Vec<IpNetwork>,
}

impl CompiledAllowlist {
    /**
     * Compila la lista textual de CIDRs de una fuente.
     *
     * Devuelve la allowlist junto con las entradas rechazadas por sintaxis;
     * una entrada inválida no invalida el resto de la lista.
     */
    pub fn compile(cidr_list: &[String]) -> (Self, Vec<String>) {
        let mut authorized_networks = Vec::with_capacity(cidr_list.len());
        let mut rejected_entries = Vec::new();

        for raw_cidr in cidr_list {
            let trimmed_cidr = raw_cidr.trim();
            if trimmed_cidr.is_empty() {
                continue;
            }
            match trimmed_cidr.parse::<IpNetwork>() {
                Ok(parsed_network) => authorized_networks.push(parsed_network),
                Err(_) => rejected_entries.push(trimmed_cidr.to_string()),
            }
        }

        (Self { authorized_networks }, rejected_entries)
    }

    /// Conjunto vacío equivale a denegar todo tráfico de la fuente.
    pub fn is_empty(&self) -> bool {
        self.authorized_networks.is_empty()
    }

    pub fn network_count(&self) -> usize {
        self.authorized_networks.len()
    }

    /// Bloque coincidente de prefijo más largo para la dirección dada.
    pub fn longest_match(&self, client_address: IpAddr) -> Option<&IpNetwork> {
        self.authorized_networks
            .iter()
            .filter(|network| network.contains(client_address))
            .max_by_key(|network| network.prefix())
    }

    pub fn permits(&self, client_address: IpAddr) -> bool {
        self.longest_match(client_address).is_some()
    }

    /// Vista textual de los bloques para la sincronización de firewall.
    pub fn render_blocks(&self) -> Vec<String> {
        self.authorized_networks
            .iter()
            .map(|network| network.to_string())
            .collect()
    }
}
