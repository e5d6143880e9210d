//! Phase-organized metrics for the export pipeline
//!
//! Each pipeline phase defines its metrics in a dedicated submodule. The
//! binary installs an in-process Prometheus recorder so a short-lived run can
//! render a text snapshot at exit; without a recorder every call is a no-op.

pub mod core;
pub mod ingest;
pub mod output;
pub mod registry;
pub mod transform;

pub use ingest::IngestMetrics;
pub use output::OutputMetrics;
pub use transform::TransformMetrics;

use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder and register all phase metrics.
///
/// Idempotent. No HTTP listener is started.
pub fn init_metrics() {
    INIT.call_once(|| {
        match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                if HANDLE.set(handle).is_err() {
                    warn!("METRICS: recorder handle was already stored");
                }
                registry::register_all_metrics();
                info!("Prometheus recorder installed (in-process render only)");
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
            }
        }
    });
}

/// Render the current snapshot in Prometheus text format, if a recorder is installed.
pub fn render_snapshot() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// Trait for phase-specific metrics collections
pub trait PhaseMetrics {
    /// Register all metrics for this phase so they appear in a snapshot
    /// even before first use.
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Metric names follow `annotation_export_{phase}_{name}[_total]`.
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("annotation_export_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("annotation_export_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("annotation_export_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
