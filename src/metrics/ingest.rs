//! Ingest Phase Metrics
//!
//! Input loading: bytes read, rows parsed and load failures per table.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct IngestMetrics;

impl IngestMetrics {
    pub fn record_table_loaded(table: &'static str, bytes: usize, rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "rows"), "table" => table)
            .increment(rows as u64);
        ::metrics::histogram!(phase_metric!(histogram, "ingest", "payload_bytes"), "table" => table)
            .record(bytes as f64);
    }

    pub fn record_load_error(table: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "load_errors"), "table" => table)
            .increment(1);
    }

    pub fn record_filtered(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "filtered_rows")).increment(rows as u64);
    }
}

impl PhaseMetrics for IngestMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = counter!(phase_metric!(counter, "ingest", "rows"));
        let _ = counter!(phase_metric!(counter, "ingest", "load_errors"));
        let _ = counter!(phase_metric!(counter, "ingest", "filtered_rows"));
        let _ = histogram!(phase_metric!(histogram, "ingest", "payload_bytes"));
    }

    fn phase_name() -> &'static str {
        "ingest"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "ingest", "rows"),
                metric_type: MetricType::Counter,
                help: "Data rows parsed from input tables",
                labels: vec!["table"],
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "load_errors"),
                metric_type: MetricType::Counter,
                help: "Input tables that failed to load",
                labels: vec!["table"],
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "filtered_rows"),
                metric_type: MetricType::Counter,
                help: "Classifications dropped by the workflow filter",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "ingest", "payload_bytes"),
                metric_type: MetricType::Histogram,
                help: "Size of each input table in bytes",
                labels: vec!["table"],
            },
        ]
    }
}
