// [apps/gateway/src/services/pipeline.rs]
/*!
 * =================================================================
 * APARATO: INGEST PIPELINE ENGINE (V4.2 - MULTI-STATUS CORE)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: VALIDAR, ENRIQUECER Y ENTREGAR A LOS WORKERS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. FAULT AGGREGATION: Un registro malformado produce una entrada en
 *    la lista de errores del lote; jamás aborta a sus vecinos.
 * 2. SYNC HOT PATH: Normalización, enriquecimiento y scoring corren en
 *    la tarea del caller sin puntos de suspensión.
 * 3. RECENCY POLICY: Con el buzón de un worker al 100%, el lote más
 *    viejo cede su lugar y 'drops_total' lo contabiliza.
 * =================================================================
 */

use crate::services::export::{ExportBatch, ExportMailbox, SubmitOutcome, BACKPRESSURE_THRESHOLD};
use crate::services::event_bus::EventBus;
use crate::state::metrics_hub::MetricsHub;
use panoptes_domain_enrichment::EnrichmentHub;
use panoptes_domain_models::adapters::normalize_record;
use panoptes_domain_models::{EnrichedRecord, FlowRecord, IngestFormat, IngestOutcome, RecordFault};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/**
 * Motor del pipeline de ingesta (C7).
 */
pub struct IngestPipeline {
    enrichment: Arc<EnrichmentHub>,
    metrics: Arc<MetricsHub>,
    event_bus: Arc<EventBus>,
    splunk_mailbox: Arc<ExportMailbox>,
    elastic_mailbox: Arc<ExportMailbox>,
}

impl IngestPipeline {
    pub fn new(
        enrichment: Arc<EnrichmentHub>,
        metrics: Arc<MetricsHub>,
        event_bus: Arc<EventBus>,
        splunk_mailbox: Arc<ExportMailbox>,
        elastic_mailbox: Arc<ExportMailbox>,
    ) -> Self {
        Self { enrichment, metrics, event_bus, splunk_mailbox, elastic_mailbox }
    }

    /**
     * Procesa un lote crudo del borde HTTP: normaliza por formato,
     * enriquece los válidos y entrega a ambos workers.
     */
    #[instrument(skip(self, raw_records), fields(format = format.label(), batch = raw_records.len()))]
    pub fn process_raw_batch(
        &self,
        format: IngestFormat,
        raw_records: &[Value],
        source_label: &str,
    ) -> IngestOutcome {
        let mut normalized_records = Vec::with_capacity(raw_records.len());
        let mut record_faults = Vec::new();

        for (record_index, raw_record) in raw_records.iter().enumerate() {
            match normalize_record(format, raw_record) {
                Ok(flow_record) => normalized_records.push(flow_record),
                Err(fault_reason) => {
                    record_faults.push(RecordFault { index: record_index, reason: fault_reason })
                }
            }
        }

        let record_ids = self.enrich_and_dispatch(normalized_records, source_label);

        IngestOutcome {
            accepted: record_ids.len(),
            rejected: record_faults.len(),
            errors: record_faults,
            record_ids,
        }
    }

    /**
     * Camino canónico del mapper UDP: registros ya normalizados.
     */
    pub fn process_canonical_batch(&self, flows: Vec<FlowRecord>, source_label: &str) -> usize {
        self.enrich_and_dispatch(flows, source_label).len()
    }

    /// Enriquecimiento + scoring + entrega; el corazón síncrono de C7.
    fn enrich_and_dispatch(&self, flows: Vec<FlowRecord>, source_label: &str) -> Vec<String> {
        if flows.is_empty() {
            return Vec::new();
        }

        let mut enriched_records = Vec::with_capacity(flows.len());
        let mut threat_matched_records: u64 = 0;
        let mut risk_sum: u64 = 0;

        for flow_record in flows {
            let verdict = self.enrichment.enrich(&flow_record);
            if !verdict.ti_matches.is_empty() {
                threat_matched_records += 1;
            }
            risk_sum += verdict.risk_score as u64;

            enriched_records.push(EnrichedRecord::assemble(
                flow_record,
                verdict.geo,
                verdict.asn,
                verdict.ti_matches,
                verdict.risk_score,
            ));
        }

        let record_ids: Vec<String> =
            enriched_records.iter().map(|record| record.record_id.clone()).collect();
        let record_count = enriched_records.len() as u64;

        // ENTREGA DUAL: cada worker recibe su copia del lote.
        let splunk_batch = ExportBatch::new(source_label, enriched_records.clone());
        let elastic_batch = ExportBatch::new(source_label, enriched_records);

        if self.splunk_mailbox.submit(splunk_batch) == SubmitOutcome::DroppedOldest {
            self.metrics.record_export_drop();
            self.event_bus.emit_log("WARN", "PIPELINE", "splunk mailbox full: oldest batch evicted");
        }
        if self.elastic_mailbox.submit(elastic_batch) == SubmitOutcome::DroppedOldest {
            self.metrics.record_export_drop();
            self.event_bus.emit_log("WARN", "PIPELINE", "elastic mailbox full: oldest batch evicted");
        }

        self.refresh_backpressure_flag();
        self.metrics.record_batch(record_count, threat_matched_records, risk_sum);

        debug!("🧪 [PIPELINE]: {} records enriched ({} threat-matched).", record_count, threat_matched_records);
        record_ids
    }

    /// Señal de contrapresión: cualquiera de los buzones > 80 %.
    pub fn refresh_backpressure_flag(&self) {
        let under_pressure = self.splunk_mailbox.occupancy() > BACKPRESSURE_THRESHOLD
            || self.elastic_mailbox.occupancy() > BACKPRESSURE_THRESHOLD;
        self.metrics.set_backpressure(under_pressure);
    }

    pub fn mailbox_occupancies(&self) -> (f64, f64) {
        (self.splunk_mailbox.occupancy(), self.elastic_mailbox.occupancy())
    }
}
