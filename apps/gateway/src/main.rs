// [apps/gateway/src/main.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY MAIN ENTRY POINT (V4.2 - GOLD MASTER)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * # Mathematical Proof (Deterministic Ignition):
 * El proceso garantiza que las migraciones del Ledger ocurran antes de
 * la apertura del socket TCP; ninguna petición observa un esquema a
 * medio construir.
 * =================================================================
 */

use dotenvy::dotenv;
use panoptes_gateway::prelude::*;
use panoptes_shared_argus::init_tracing;
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. CARGA DE ENTORNO
    dotenv().ok();

    // 2. INICIALIZACIÓN DE OBSERVABILIDAD (ARGUS)
    init_tracing("panoptes_gateway");

    // 3. RUNTIME MULTIHILO DIMENSIONADO AL HOST
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(num_cpus::get().max(2))
        .build()?;

    runtime.block_on(async {
        info!("🛰️  [GATEWAY]: Ignition sequence starting...");

        // 4. CAPTURA TIPADA DE LA CONFIGURACIÓN
        let gateway_config = GatewayConfig::capture();

        // 5. IGNICIÓN DEL KERNEL (Ledger + estado + daemons + HTTP)
        match GatewayKernel::ignite(gateway_config).await {
            Ok(kernel_instance) => {
                if let Err(launch_fault) = kernel_instance.launch_gateway_operations().await {
                    error!("💀 [GATEWAY_COLLAPSE]: Runtime failure: {}", launch_fault);
                    std::process::exit(1);
                }
            }
            Err(ignition_fault) => {
                error!("💀 [IGNITION_FAILED]: {}", ignition_fault);
                std::process::exit(1);
            }
        }
    });

    Ok(())
}
