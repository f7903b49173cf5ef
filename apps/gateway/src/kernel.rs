// INICIO DEL ARCHIVO [apps/gateway/src/kernel.rs]
/**
 * =================================================================
 * APARATO: GATEWAY SOVEREIGN KERNEL (V4.5 - DAEMON MATRIX)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * VISION HIPER-HOLÍSTICA:
 * Actúa como la placa base donde se conectan todos los servicios:
 * workers de exportación, replay de la DLQ, marcapasos de métricas,
 * podador de higiene, cabezal UDP y el transporte HTTP. El apagado
 * ordenado drena los buffers de exportación hacia la DLQ dentro de la
 * ventana de gracia configurada.
 * =================================================================
 */

use crate::config::GatewayConfig;
use crate::routes::create_gateway_router;
use crate::services::dlq_replay::DlqReplayDaemon;
use crate::services::export::ExportWorker;
use crate::services::pruner::spawn_pruner;
use crate::services::ticker::spawn_metrics_ticker;
use crate::services::udp_head::UdpHeadService;
use crate::state::AppState;
use panoptes_domain_models::SinkTarget;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

pub struct GatewayKernel {
    pub server_network_port: u16,
    pub application_state: AppState,
}

impl GatewayKernel {
    /**
     * Realiza la ignición del Ledger y del estado del gateway.
     * Las migraciones corren aquí; hasta 'launch' el proceso responde
     * warming_up en las rutas no públicas.
     */
    #[instrument(skip(config))]
    pub async fn ignite(config: GatewayConfig) -> anyhow::Result<Self> {
        let listening_port = config.http_port;
        let application_state = AppState::ignite(config).await?;

        Ok(Self { server_network_port: listening_port, application_state })
    }

    /**
     * Lanza los daemons autónomos y el transporte HTTP principal.
     */
    pub async fn launch_gateway_operations(self) -> anyhow::Result<()> {
        let state = self.application_state.clone();
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);

        // --- 1. WORKERS DE EXPORTACIÓN (C9) ---
        for (sink_target, mailbox) in [
            (SinkTarget::Splunk, Arc::clone(&state.splunk_mailbox)),
            (SinkTarget::Elastic, Arc::clone(&state.elastic_mailbox)),
        ] {
            let worker = ExportWorker::new(
                sink_target,
                mailbox,
                Arc::clone(&state.sink_router),
                Arc::clone(&state.dlq_repository),
                Arc::clone(&state.metrics),
                Arc::clone(&state.event_bus),
                state.config.export_batch_max,
                state.config.export_flush_ms,
                state.config.export_retry_max,
                state.config.dlq_replay_ms,
            );
            let worker_shutdown = shutdown_receiver.clone();
            tokio::spawn(async move { worker.run(worker_shutdown).await });
        }

        // --- 2. REPLAY DE LA COLA DE CARTAS MUERTAS ---
        let replay_daemon = DlqReplayDaemon::new(
            Arc::clone(&state.dlq_repository),
            Arc::clone(&state.sink_router),
            Arc::clone(&state.metrics),
            Arc::clone(&state.event_bus),
            state.config.dlq_replay_ms,
            state.config.dlq_retention_sec,
        );
        let replay_shutdown = shutdown_receiver.clone();
        tokio::spawn(async move { replay_daemon.run(replay_shutdown).await });

        // --- 3. MARCAPASOS DE MÉTRICAS (1 HZ) Y PODADOR DE HIGIENE ---
        spawn_metrics_ticker(
            Arc::clone(&state.metrics),
            Arc::clone(&state.pipeline),
            shutdown_receiver.clone(),
        );
        spawn_pruner(
            Arc::clone(&state.audit_ring),
            Arc::clone(&state.idempotency_vault),
            Arc::clone(&state.source_directory),
            shutdown_receiver.clone(),
        );

        // --- 4. CABEZAL UDP (subsistema opcional) ---
        if state.config.feature_udp_head {
            let udp_head = UdpHeadService::new(
                Arc::clone(&state.flow_queue),
                state.config.udp_queue_policy,
                Arc::clone(&state.metrics),
                Arc::clone(&state.pipeline),
                state.config.udp_port,
                state.config.udp_source_label.clone(),
            );
            udp_head.spawn(shutdown_receiver.clone());
        } else {
            info!("💤 [UDP_HEAD]: Subsystem disabled by FEATURE_UDP_HEAD.");
        }

        // --- 5. LISTENER DE RECARGA (SIGHUP) ---
        spawn_reload_listener(state.clone());

        // --- 6. FIN DEL WARMING: superficie completa abierta ---
        state.mark_ready();

        // --- 7. IGNICIÓN DEL TRANSPORTE HTTP (AXUM) ---
        let gateway_router = create_gateway_router(state.clone());
        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().expect("static address"),
            self.server_network_port,
        );

        let tcp_listener = tokio::net::TcpListener::bind(bind_address).await?;
        info!("🚀 [KERNEL_ONLINE]: Panoptes gateway listening at {}", bind_address);

        let serve_result = axum::serve(
            tcp_listener,
            gateway_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(wait_for_termination_signal())
        .await;

        if let Err(server_error) = serve_result {
            error!("💀 [KERNEL_COLLAPSE]: HTTP transport failure: {}", server_error);
        }

        // --- 8. APAGADO ORDENADO: drenaje dentro de la ventana de gracia ---
        info!("🛑 [KERNEL]: Shutdown sequence engaged; draining export buffers...");
        let _ = shutdown_sender.send(true);
        state.flow_queue.close();
        state.splunk_mailbox.close();
        state.elastic_mailbox.close();

        tokio::time::sleep(Duration::from_secs(state.config.shutdown_grace_sec)).await;
        info!("✅ [KERNEL]: Graceful window elapsed; process exiting.");
        Ok(())
    }
}

/// Espera SIGINT (y SIGTERM en Unix) para el apagado ordenado.
async fn wait_for_termination_signal() {
    #[cfg(unix)]
    {
        let mut sigterm_stream =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("FATAL: SIGTERM handler installation failed.");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm_stream.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// SIGHUP: recarga de bases geo y del snapshot de amenazas sin reinicio.
fn spawn_reload_listener(state: AppState) {
    #[cfg(unix)]
    tokio::spawn(async move {
        let mut sighup_stream =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
                Ok(stream) => stream,
                Err(install_fault) => {
                    warn!("⚠️ [RELOAD_LISTENER]: SIGHUP handler unavailable: {}", install_fault);
                    return;
                }
            };

        while sighup_stream.recv().await.is_some() {
            info!("🔄 [RELOAD_LISTENER]: SIGHUP received; swapping enrichment handles...");
            state.enrichment.geo().reload();
            if let Err(rebuild_fault) = state.rebuild_threat_snapshot().await {
                error!("❌ [RELOAD_LISTENER]: Threat snapshot rebuild failed: {}", rebuild_fault);
            }
        }
    });

    #[cfg(not(unix))]
    {
        let _ = state;
    }
}
// FIN DEL ARCHIVO [apps/gateway/src/kernel.rs]
