//! Output Phase Metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct OutputMetrics;

impl OutputMetrics {
    pub fn record_written(rows: usize, columns: usize) {
        ::metrics::counter!(phase_metric!(counter, "output", "rows")).increment(rows as u64);
        ::metrics::gauge!(phase_metric!(gauge, "output", "columns")).set(columns as f64);
    }

    pub fn record_run(duration_secs: f64, success: bool) {
        let status = if success { "success" } else { "failure" };
        ::metrics::counter!(phase_metric!(counter, "output", "runs"), "status" => status).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "output", "run_duration_seconds"))
            .record(duration_secs);
    }
}

impl PhaseMetrics for OutputMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge, histogram};

        let _ = counter!(phase_metric!(counter, "output", "rows"));
        let _ = counter!(phase_metric!(counter, "output", "runs"));
        let _ = gauge!(phase_metric!(gauge, "output", "columns"));
        let _ = histogram!(phase_metric!(histogram, "output", "run_duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "output"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "output", "rows"),
                metric_type: MetricType::Counter,
                help: "Rows written to the merged export",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "output", "runs"),
                metric_type: MetricType::Counter,
                help: "Pipeline runs by outcome",
                labels: vec!["status"],
            },
            MetricDoc {
                name: phase_metric!(gauge, "output", "columns"),
                metric_type: MetricType::Gauge,
                help: "Columns in the merged export",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "output", "run_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall-clock duration of a full run in seconds",
                labels: vec![],
            },
        ]
    }
}
