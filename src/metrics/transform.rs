//! Transform Phase Metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct TransformMetrics;

impl TransformMetrics {
    pub fn record_decoded(column: &'static str, rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "transform", "decoded_cells"), "column" => column)
            .increment(rows as u64);
    }

    pub fn record_decode_error(column: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "transform", "decode_errors"), "column" => column)
            .increment(1);
    }

    pub fn record_flattened_columns(origin: &'static str, columns: usize) {
        ::metrics::gauge!(phase_metric!(gauge, "transform", "flattened_columns"), "origin" => origin)
            .set(columns as f64);
    }

    pub fn record_join(matched: usize, unmatched: usize) {
        ::metrics::counter!(phase_metric!(counter, "transform", "join_matched")).increment(matched as u64);
        ::metrics::counter!(phase_metric!(counter, "transform", "join_unmatched"))
            .increment(unmatched as u64);
    }

    pub fn record_duplicate_subjects(dropped: usize) {
        ::metrics::counter!(phase_metric!(counter, "transform", "duplicate_subjects"))
            .increment(dropped as u64);
    }
}

impl PhaseMetrics for TransformMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge, histogram};

        let _ = counter!(phase_metric!(counter, "transform", "decoded_cells"));
        let _ = counter!(phase_metric!(counter, "transform", "decode_errors"));
        let _ = counter!(phase_metric!(counter, "transform", "join_matched"));
        let _ = counter!(phase_metric!(counter, "transform", "join_unmatched"));
        let _ = counter!(phase_metric!(counter, "transform", "duplicate_subjects"));
        let _ = gauge!(phase_metric!(gauge, "transform", "flattened_columns"));
        let _ = histogram!(phase_metric!(histogram, "transform", "stage_duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "transform"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "transform", "decoded_cells"),
                metric_type: MetricType::Counter,
                help: "Structured cells decoded",
                labels: vec!["column"],
            },
            MetricDoc {
                name: phase_metric!(counter, "transform", "decode_errors"),
                metric_type: MetricType::Counter,
                help: "Structured cells that failed to decode",
                labels: vec!["column"],
            },
            MetricDoc {
                name: phase_metric!(counter, "transform", "join_matched"),
                metric_type: MetricType::Counter,
                help: "Classifications joined to a subject",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "transform", "join_unmatched"),
                metric_type: MetricType::Counter,
                help: "Classifications whose subject was not found",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "transform", "duplicate_subjects"),
                metric_type: MetricType::Counter,
                help: "Repeated subject rows dropped before the join",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "transform", "flattened_columns"),
                metric_type: MetricType::Gauge,
                help: "Columns produced by flattening a structured field",
                labels: vec!["origin"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "transform", "stage_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Duration of each transform stage in seconds",
                labels: vec!["stage"],
            },
        ]
    }
}
