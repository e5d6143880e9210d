//! Metrics registry for coordinating phase-specific metrics
//!
//! Registers every phase's metrics and detects naming conflicts early.

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Register all metrics from all phases
pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::ingest::IngestMetrics>(&mut all_metrics);
    register_phase_metrics::<super::transform::TransformMetrics>(&mut all_metrics);
    register_phase_metrics::<super::output::OutputMetrics>(&mut all_metrics);

    info!(
        "Registered {} total metrics across all phases",
        all_metrics.len()
    );
}

/// Register metrics for a specific phase and detect conflicts
fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<&'static str, MetricDoc>) {
    T::register_metrics();
    let phase_name = T::phase_name();

    for doc in T::metrics_documentation() {
        if extract_phase_from_metric_name(doc.name) != phase_name {
            warn!(
                "Metric '{}' is registered by phase '{}' but named for another phase",
                doc.name, phase_name
            );
        }
        if all_metrics.contains_key(doc.name) {
            warn!(
                "Metric name conflict detected: '{}' is registered twice (phase '{}')",
                doc.name, phase_name
            );
        } else {
            debug!(
                "  - {} ({:?}, labels {:?}): {}",
                doc.name, doc.metric_type, doc.labels, doc.help
            );
            all_metrics.insert(doc.name, doc);
        }
    }
}

/// Extract phase name from metric name (e.g. "annotation_export_ingest_rows_total" -> "ingest")
pub fn extract_phase_from_metric_name(metric_name: &str) -> &str {
    if let Some(stripped) = metric_name.strip_prefix("annotation_export_") {
        if let Some(next_underscore) = stripped.find('_') {
            return &stripped[..next_underscore];
        }
    }
    "unknown"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{IngestMetrics, OutputMetrics, TransformMetrics};
    use std::collections::HashSet;

    fn all_docs() -> Vec<(&'static str, MetricDoc)> {
        let mut docs = Vec::new();
        docs.extend(IngestMetrics::metrics_documentation().into_iter().map(|d| (IngestMetrics::phase_name(), d)));
        docs.extend(TransformMetrics::metrics_documentation().into_iter().map(|d| (TransformMetrics::phase_name(), d)));
        docs.extend(OutputMetrics::metrics_documentation().into_iter().map(|d| (OutputMetrics::phase_name(), d)));
        docs
    }

    #[test]
    fn test_metric_names_are_unique() {
        let mut seen = HashSet::new();
        for (_, doc) in all_docs() {
            assert!(seen.insert(doc.name), "duplicate metric {}", doc.name);
        }
    }

    #[test]
    fn test_metric_names_carry_their_phase() {
        for (phase, doc) in all_docs() {
            assert_eq!(extract_phase_from_metric_name(doc.name), phase);
        }
    }

    #[test]
    fn test_extract_phase_from_metric_name() {
        assert_eq!(
            extract_phase_from_metric_name("annotation_export_transform_join_matched_total"),
            "transform"
        );
        assert_eq!(extract_phase_from_metric_name("invalid_metric_name"), "unknown");
    }
}
