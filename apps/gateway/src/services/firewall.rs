// [apps/gateway/src/services/firewall.rs]
/*!
 * =================================================================
 * APARATO: FIREWALL SYNC PORT (V1.3)
 * CLASIFICACIÓN: INFRASTRUCTURE PORT (ESTRATO L4)
 * RESPONSABILIDAD: ENTREGA DE LA UNIÓN DE ALLOWLISTS AL HOST
 *
 * El firewall del host es un colaborador externo: el núcleo computa la
 * unión y la entrega por este puerto; el adaptador por defecto solo
 * deja rastro (la aplicación real vive fuera del proceso).
 * =================================================================
 */

use tracing::info;

/// Puerto hacia el firewall del host.
/// Devuelve la cantidad de bloques CIDR que el adaptador aplicó.
pub trait FirewallPort: Send + Sync {
    fn apply_allowlist(&self, cidr_union: &[String]) -> usize;
}

/// Adaptador por defecto: registra la unión sin tocar el host.
#[derive(Debug, Default)]
pub struct LogOnlyFirewall;

impl FirewallPort for LogOnlyFirewall {
    fn apply_allowlist(&self, cidr_union: &[String]) -> usize {
        info!(
            "🧱 [FIREWALL_SYNC]: Allowlist union of {} CIDR blocks handed to the host adapter.",
            cidr_union.len()
        );

        cidr_union.len()
    }
}
