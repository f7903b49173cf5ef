// [apps/gateway/src/lib.rs]
/*!
 * =================================================================
 * APARATO: PANOPTES GATEWAY LIBRARY HUB (V4.0)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE LOS ESTRATOS DEL GATEWAY
 * =================================================================
 */

pub mod config;
pub mod handlers;
pub mod kernel;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

/// Preludio nominal para el binario y los arneses de prueba.
pub mod prelude {
    pub use crate::config::GatewayConfig;
    pub use crate::kernel::GatewayKernel;
    pub use crate::routes::create_gateway_router;
    pub use crate::state::AppState;
}
