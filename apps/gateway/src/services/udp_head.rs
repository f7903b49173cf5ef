// [apps/gateway/src/services/udp_head.rs]
/*!
 * =================================================================
 * APARATO: UDP COLLECTOR HEAD (V4.1 - READER + MAPPER)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: DATAGRAMAS NETFLOW/IPFIX -> PIPELINE CANÓNICO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TWO-TASK TOPOLOGY: Lector (socket -> cola acotada) y mapper
 *    (cola -> pipeline) unidos por la BoundedQueue en proceso.
 * 2. IMMEDIATE CANCEL: La cancelación del lector es inmediata; los
 *    errores de decodificación en vuelo se cuentan y jamás bloquean
 *    el apagado.
 * 3. SELF-BATCHING: El mapper agrupa por volumen (500) o por tiempo
 *    (1 s) antes de entregar al pipeline.
 * =================================================================
 */

use crate::services::pipeline::IngestPipeline;
use crate::state::metrics_hub::MetricsHub;
use crate::state::source_directory::now_epoch_ms;
use panoptes_domain_models::FlowRecord;
use panoptes_infra_netflow::{BoundedQueue, DatagramDecoder, OverflowPolicy};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Tamaño máximo de datagrama aceptado (jumbo UDP).
const MAX_DATAGRAM_BYTES: usize = 65_535;
/// Volumen de auto-lote del mapper.
const MAPPER_BATCH_RECORDS: usize = 500;
/// Ventana temporal de auto-lote del mapper.
const MAPPER_BATCH_WINDOW_MS: u64 = 1_000;

/**
 * Cabezal UDP completo: despliega lector y mapper sobre el runtime.
 */
pub struct UdpHeadService {
    flow_queue: Arc<BoundedQueue<FlowRecord>>,
    queue_policy: OverflowPolicy,
    metrics: Arc<MetricsHub>,
    pipeline: Arc<IngestPipeline>,
    udp_port: u16,
    source_label: String,
}

impl UdpHeadService {
    pub fn new(
        flow_queue: Arc<BoundedQueue<FlowRecord>>,
        queue_policy: OverflowPolicy,
        metrics: Arc<MetricsHub>,
        pipeline: Arc<IngestPipeline>,
        udp_port: u16,
        source_label: String,
    ) -> Self {
        Self { flow_queue, queue_policy, metrics, pipeline, udp_port, source_label }
    }

    /**
     * Despliega ambas tareas del cabezal. El lector reporta el estado
     * del socket en el hub de métricas para el endpoint de salud.
     */
    pub fn spawn(self, shutdown_signal: watch::Receiver<bool>) {
        let reader_queue = Arc::clone(&self.flow_queue);
        let reader_metrics = Arc::clone(&self.metrics);
        let reader_policy = self.queue_policy;
        let reader_port = self.udp_port;
        let reader_shutdown = shutdown_signal.clone();

        tokio::spawn(async move {
            run_reader(reader_queue, reader_metrics, reader_policy, reader_port, reader_shutdown).await;
        });

        let mapper_queue = Arc::clone(&self.flow_queue);
        let mapper_pipeline = Arc::clone(&self.pipeline);
        let mapper_label = self.source_label.clone();

        tokio::spawn(async move {
            run_mapper(mapper_queue, mapper_pipeline, mapper_label).await;
        });
    }
}

/// Tarea lectora: socket -> decodificación -> cola acotada.
async fn run_reader(
    flow_queue: Arc<BoundedQueue<FlowRecord>>,
    metrics: Arc<MetricsHub>,
    queue_policy: OverflowPolicy,
    udp_port: u16,
    mut shutdown_signal: watch::Receiver<bool>,
) {
    let bind_address = format!("0.0.0.0:{}", udp_port);
    let socket = match UdpSocket::bind(&bind_address).await {
        Ok(bound_socket) => {
            metrics.set_udp_socket_bound(true);
            info!("📡 [UDP_HEAD]: Collector listening on {}.", bind_address);
            bound_socket
        }
        Err(bind_fault) => {
            error!("💀 [UDP_HEAD]: Socket bind failed on {}: {}", bind_address, bind_fault);
            return;
        }
    };

    let mut datagram_buffer = vec![0u8; MAX_DATAGRAM_BYTES];
    let mut decoder = DatagramDecoder::new();

    loop {
        tokio::select! {
            receive_result = socket.recv_from(&mut datagram_buffer) => {
                let (datagram_length, _sender_address) = match receive_result {
                    Ok(reception) => reception,
                    Err(receive_fault) => {
                        warn!("⚠️ [UDP_HEAD]: Receive fault: {}", receive_fault);
                        continue;
                    }
                };

                metrics.record_udp_packet(datagram_length as u64, now_epoch_ms());

                match decoder.decode(&datagram_buffer[..datagram_length]) {
                    Ok(decoded_datagram) => {
                        if decoded_datagram.faulted_records > 0 {
                            metrics.record_udp_decode_error();
                        }

                        for flow_record in decoded_datagram.records {
                            let push_outcome = match queue_policy {
                                OverflowPolicy::Block => flow_queue.push_waiting(flow_record).await,
                                _ => flow_queue.push(flow_record),
                            };
                            if push_outcome.dropped_one() {
                                metrics.record_udp_drops(1);
                            }
                        }
                    }
                    Err(decode_fault) => {
                        metrics.record_udp_decode_error();
                        debug!("🧨 [UDP_DECODE]: {}", decode_fault);
                    }
                }
            },
            _ = shutdown_signal.changed() => {
                if *shutdown_signal.borrow() {
                    break;
                }
            },
        }
    }

    // Cancelación inmediata: cerramos la cola para drenar el mapper.
    metrics.set_udp_socket_bound(false);
    flow_queue.close();
    info!("🛑 [UDP_HEAD]: Reader offline; queue sealed for mapper drain.");
}

/// Tarea mapper: cola acotada -> lotes canónicos -> pipeline.
async fn run_mapper(
    flow_queue: Arc<BoundedQueue<FlowRecord>>,
    pipeline: Arc<IngestPipeline>,
    source_label: String,
) {
    info!("🔁 [UDP_MAPPER]: Canonical mapper online (label '{}').", source_label);

    loop {
        // Primer registro: espera cooperativa; None = cola cerrada y drenada.
        let Some(first_record) = flow_queue.pop().await else {
            break;
        };

        let mut record_batch = Vec::with_capacity(MAPPER_BATCH_RECORDS);
        record_batch.push(first_record);

        // Auto-lote por volumen o por ventana temporal.
        let batch_deadline =
            tokio::time::Instant::now() + std::time::Duration::from_millis(MAPPER_BATCH_WINDOW_MS);

        while record_batch.len() < MAPPER_BATCH_RECORDS {
            match flow_queue.try_pop() {
                Some(queued_record) => record_batch.push(queued_record),
                None => {
                    if tokio::time::Instant::now() >= batch_deadline {
                        break;
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    if flow_queue.is_empty() && tokio::time::Instant::now() >= batch_deadline {
                        break;
                    }
                }
            }
        }

        let processed_count = pipeline.process_canonical_batch(record_batch, &source_label);
        debug!("📦 [UDP_MAPPER]: {} records handed to the pipeline.", processed_count);
    }

    info!("🛑 [UDP_MAPPER]: Mapper drained and offline.");
}
