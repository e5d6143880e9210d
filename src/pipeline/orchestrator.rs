use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::constants::{
    ANNOTATIONS, CLASSIFICATIONS_TABLE, CLASSIFICATION_ID, CLASSIFICATION_SUFFIX, LOCATIONS, METADATA,
    ORIGIN_ANNOTATIONS, ORIGIN_METADATA, SUBJECTS_TABLE, SUBJECT_ID, SUBJECT_IDS, SUBJECT_SUFFIX,
    WORKFLOW_ID,
};
use crate::error::{ExportError, Result};
use crate::metrics::core::TimingGuard;
use crate::metrics::{phase_metric, IngestMetrics, OutputMetrics, TransformMetrics};
use crate::pipeline::export::{write_csv_atomic, write_json_atomic};
use crate::pipeline::ingestion::{read_frame, Source, TableSpec};
use crate::pipeline::processing::anonymize::{drop_pii, ensure_pii_free};
use crate::pipeline::processing::{
    collapse_locations, combine_aligned, decode_column, extract_task_values, flatten_rows, left_join,
    Anonymizer, DecodedColumn, JoinReport, Shape,
};
use crate::table::Frame;

const STAGE_HISTOGRAM: &str = phase_metric!(histogram, "transform", "stage_duration_seconds");

/// Settings that change what the transform produces.
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    pub anonymizer: Anonymizer,
    pub workflow_id: Option<String>,
}

impl From<&Config> for TransformOptions {
    fn from(config: &Config) -> Self {
        Self {
            anonymizer: Anonymizer::new(config.anonymous_marker.clone()),
            workflow_id: config.workflow_id.clone(),
        }
    }
}

/// Counters gathered while transforming, before anything is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformStats {
    pub classifications_in: usize,
    pub subjects_in: usize,
    pub filtered_classifications: usize,
    pub duplicate_subjects_dropped: usize,
    pub join: JoinReport,
}

#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub frame: Frame,
    pub stats: TransformStats,
}

/// Result of a complete export run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub classifications_in: usize,
    pub subjects_in: usize,
    pub filtered_classifications: usize,
    pub duplicate_subjects_dropped: usize,
    pub output_rows: usize,
    pub output_columns: usize,
    pub unmatched_subjects: usize,
    pub missing_subject_ids: Vec<String>,
    pub output_file: String,
    pub duration_secs: f64,
}

pub struct Pipeline;

impl Pipeline {
    /// Load both exports, transform them and write the merged file.
    ///
    /// Nothing is written unless every step succeeds.
    pub fn run(config: &Config) -> Result<PipelineResult> {
        let run_id = Uuid::new_v4();
        let span = info_span!("export_run", run_id = %run_id);
        let _enter = span.enter();

        let t_run = Instant::now();
        let result = Self::run_inner(config, run_id, t_run);
        let duration = t_run.elapsed().as_secs_f64();
        OutputMetrics::record_run(duration, result.is_ok());
        if let Err(e) = &result {
            error!("Export run failed: {}", e);
        }
        result
    }

    fn run_inner(config: &Config, run_id: Uuid, t_run: Instant) -> Result<PipelineResult> {
        config.validate()?;
        let started_at = Utc::now();
        info!("🚀 Starting export run");

        let timeout = config.http_timeout();
        let classifications =
            Self::load_table(&config.classifications_source()?, &TableSpec::classifications(), timeout)?;
        let subjects = Self::load_table(&config.subjects_source()?, &TableSpec::subjects(), timeout)?;

        let outcome = Self::transform(classifications, subjects, &TransformOptions::from(config))?;
        let TransformOutcome { frame, stats } = outcome;

        write_csv_atomic(&frame, &config.output)?;
        let output_columns = frame.columns().len() + 1;
        OutputMetrics::record_written(frame.len(), output_columns);

        let result = PipelineResult {
            run_id,
            started_at,
            classifications_in: stats.classifications_in,
            subjects_in: stats.subjects_in,
            filtered_classifications: stats.filtered_classifications,
            duplicate_subjects_dropped: stats.duplicate_subjects_dropped,
            output_rows: frame.len(),
            output_columns,
            unmatched_subjects: stats.join.unmatched,
            missing_subject_ids: stats.join.missing_keys,
            output_file: config.output.display().to_string(),
            duration_secs: t_run.elapsed().as_secs_f64(),
        };

        if let Some(report) = &config.report {
            write_json_atomic(&result, report)?;
            info!("📝 Wrote run report to {}", report.display());
        }

        info!(
            "✅ Exported {} rows x {} columns ({} unmatched subject references)",
            result.output_rows, result.output_columns, result.unmatched_subjects
        );
        Ok(result)
    }

    #[instrument(skip(source, spec, timeout), fields(table = spec.name, source = %source))]
    fn load_table(source: &Source, spec: &TableSpec, timeout: Duration) -> Result<Frame> {
        info!("📡 Loading {} from {}", spec.name, source);
        let loaded = source
            .load(timeout)
            .and_then(|bytes| read_frame(&bytes, spec).map(|frame| (bytes.len(), frame)));
        match loaded {
            Ok((bytes, frame)) => {
                IngestMetrics::record_table_loaded(spec.name, bytes, frame.len());
                Ok(frame)
            }
            Err(e) => {
                IngestMetrics::record_load_error(spec.name);
                Err(e)
            }
        }
    }

    /// Turn the two raw tables into the merged, anonymized table.
    ///
    /// Output holds one row per (kept) classification, in input order, with
    /// the classification identifier as index.
    pub fn transform(
        classifications: Frame,
        subjects: Frame,
        options: &TransformOptions,
    ) -> Result<TransformOutcome> {
        let mut stats = TransformStats {
            classifications_in: classifications.len(),
            subjects_in: subjects.len(),
            ..TransformStats::default()
        };

        classifications.ensure_unique_ids()?;
        let mut classifications = classifications;
        if let Some(workflow_id) = &options.workflow_id {
            stats.filtered_classifications = Self::filter_workflow(&mut classifications, workflow_id)?;
        }
        let expected_rows = classifications.len();

        let classifications = Self::flatten_classifications(classifications, &options.anonymizer)?;
        let (subjects, duplicates) = Self::flatten_subjects(subjects)?;
        stats.duplicate_subjects_dropped = duplicates;

        let (merged, join) = {
            let _timer = TimingGuard::new(STAGE_HISTOGRAM, "join");
            left_join(
                &classifications,
                SUBJECT_IDS,
                &subjects,
                (CLASSIFICATION_SUFFIX, SUBJECT_SUFFIX),
            )?
        };
        TransformMetrics::record_join(join.matched, join.unmatched);
        if join.unmatched > 0 {
            warn!(
                "⚠️  {} classifications reference missing subjects ({} distinct ids)",
                join.unmatched,
                join.missing_keys.len()
            );
        }

        if merged.len() != expected_rows {
            return Err(ExportError::Integrity(format!(
                "merged table has {} rows, expected {}",
                merged.len(),
                expected_rows
            )));
        }
        ensure_pii_free(&merged)?;

        stats.join = join;
        Ok(TransformOutcome { frame: merged, stats })
    }

    fn filter_workflow(classifications: &mut Frame, workflow_id: &str) -> Result<usize> {
        let pos = classifications.require_column(CLASSIFICATIONS_TABLE, WORKFLOW_ID)?;
        let wanted = workflow_id.trim();
        let removed = classifications
            .retain_rows(|row| row.cells[pos].as_deref().map(str::trim) == Some(wanted));
        IngestMetrics::record_filtered(removed);
        info!("🔎 Workflow filter {} kept {} rows, removed {}", wanted, classifications.len(), removed);
        if classifications.is_empty() {
            warn!("⚠️  No classifications belong to workflow {}", wanted);
        }
        Ok(removed)
    }

    fn decode(frame: &Frame, table: &str, column: &'static str, shape: Shape) -> Result<DecodedColumn> {
        match decode_column(frame, table, column, shape) {
            Ok(decoded) => {
                TransformMetrics::record_decoded(column, decoded.len());
                Ok(decoded)
            }
            Err(e) => {
                TransformMetrics::record_decode_error(column);
                Err(e)
            }
        }
    }

    /// Decode and flatten metadata and annotations, anonymize identity
    /// columns, and combine everything back on the classification id.
    #[instrument(skip_all, fields(rows = classifications.len()))]
    fn flatten_classifications(mut classifications: Frame, anonymizer: &Anonymizer) -> Result<Frame> {
        let _timer = TimingGuard::new(STAGE_HISTOGRAM, "classifications");

        let metadata = Self::decode(&classifications, CLASSIFICATIONS_TABLE, METADATA, Shape::Object)?;
        let annotations =
            Self::decode(&classifications, CLASSIFICATIONS_TABLE, ANNOTATIONS, Shape::Array)?;

        let metadata_frame = flatten_rows(CLASSIFICATION_ID, &metadata.values)?;
        TransformMetrics::record_flattened_columns(ORIGIN_METADATA, metadata_frame.columns().len());

        let task_values = annotations
            .values
            .iter()
            .map(|(id, value)| Ok((id.clone(), Value::Object(extract_task_values(id, value)?))))
            .collect::<Result<Vec<_>>>()?;
        let annotations_frame = flatten_rows(CLASSIFICATION_ID, &task_values)?;
        TransformMetrics::record_flattened_columns(ORIGIN_ANNOTATIONS, annotations_frame.columns().len());
        debug!(
            metadata_columns = metadata_frame.columns().len(),
            annotation_columns = annotations_frame.columns().len(),
            "Flattened classification fields"
        );

        classifications.drop_columns(&[METADATA, ANNOTATIONS]);
        anonymizer.apply(&mut classifications, CLASSIFICATIONS_TABLE)?;

        combine_aligned(
            classifications,
            vec![
                (metadata_frame, ORIGIN_METADATA),
                (annotations_frame, ORIGIN_ANNOTATIONS),
            ],
        )
    }

    /// Collapse locations, flatten metadata and drop repeated subject rows.
    /// Returns the flat subjects table and how many duplicates were dropped.
    ///
    /// Every row is decoded before duplicates are dropped, so a malformed
    /// repeat still fails the run.
    #[instrument(skip_all, fields(rows = subjects.len()))]
    fn flatten_subjects(mut subjects: Frame) -> Result<(Frame, usize)> {
        let _timer = TimingGuard::new(STAGE_HISTOGRAM, "subjects");

        let locations = Self::decode(&subjects, SUBJECTS_TABLE, LOCATIONS, Shape::Object)?;
        let metadata = Self::decode(&subjects, SUBJECTS_TABLE, METADATA, Shape::Object)?;

        let duplicates = subjects.dedup_ids();
        if duplicates > 0 {
            warn!("⚠️  Dropped {} repeated {} rows (first occurrence kept)", duplicates, SUBJECT_ID);
            TransformMetrics::record_duplicate_subjects(duplicates);
        }
        let locations = first_per_id(locations.values);
        let metadata = first_per_id(metadata.values);

        let collapsed = locations
            .iter()
            .map(|(_, value)| value.as_object().map(collapse_locations))
            .collect();
        subjects.replace_column(LOCATIONS, collapsed)?;

        let metadata_frame = flatten_rows(SUBJECT_ID, &metadata)?;
        TransformMetrics::record_flattened_columns("subject_metadata", metadata_frame.columns().len());

        subjects.drop_columns(&[METADATA]);
        let leaked = drop_pii(&mut subjects);
        if !leaked.is_empty() {
            warn!("⚠️  Removed identity columns from subjects: {}", leaked.join(", "));
        }

        let combined = combine_aligned(subjects, vec![(metadata_frame, ORIGIN_METADATA)])?;
        Ok((combined, duplicates))
    }
}

/// Keep the first value decoded for each row id, matching `Frame::dedup_ids`.
fn first_per_id(values: Vec<(String, Value)>) -> Vec<(String, Value)> {
    let mut seen = HashSet::with_capacity(values.len());
    values.into_iter().filter(|(id, _)| seen.insert(id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::anonymize::hash_identity;

    fn cell(s: &str) -> Option<String> {
        if s.is_empty() {
            None
        } else {
            Some(s.to_string())
        }
    }

    fn classifications(rows: &[[&str; 8]]) -> Frame {
        let mut frame = Frame::new(
            "classification_id",
            [
                "subject_ids",
                "user_name",
                "user_id",
                "user_ip",
                "workflow_id",
                "metadata",
                "annotations",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        );
        for row in rows {
            frame
                .push_row(row[0], row[1..].iter().map(|c| cell(c)).collect())
                .unwrap();
        }
        frame
    }

    fn subjects(rows: &[[&str; 3]]) -> Frame {
        let mut frame = Frame::new("subject_id", vec!["metadata".to_string(), "locations".to_string()]);
        for row in rows {
            frame
                .push_row(row[0], row[1..].iter().map(|c| cell(c)).collect())
                .unwrap();
        }
        frame
    }

    fn value<'a>(frame: &'a Frame, row: usize, column: &str) -> Option<&'a str> {
        let pos = frame.position(column).unwrap();
        frame.rows()[row].cells[pos].as_deref()
    }

    #[test]
    fn test_transform_merges_and_anonymizes() {
        let c = classifications(&[
            [
                "1",
                "10",
                "alice",
                "7",
                "1.2.3.4",
                "5",
                r#"{"source": "api", "viewport": {"width": 800}}"#,
                r#"[{"task": "T0", "task_label": "Animal?", "value": "Yes"}]"#,
            ],
            [
                "2",
                "11",
                "not-logged-in-abc",
                "",
                "1.2.3.5",
                "5",
                r#"{"source": "web"}"#,
                r#"[{"task": "T0", "value": "No"}, {"task": "T1", "value": 2}]"#,
            ],
        ]);
        let s = subjects(&[
            ["10", r#"{"Filename": "a.jpg"}"#, r#"{"0": "http://a"}"#],
            ["11", r#"{"Filename": "b.jpg", "site": {"name": "X"}}"#, r#"{"0": "http://b", "1": "http://c"}"#],
        ]);

        let outcome = Pipeline::transform(c, s, &TransformOptions::default()).unwrap();
        let frame = outcome.frame;

        assert_eq!(frame.index_name(), "classification_id");
        assert_eq!(frame.ids().collect::<Vec<_>>(), vec!["1", "2"]);
        for pii in ["user_name", "user_id", "user_ip"] {
            assert!(!frame.has_column(pii));
        }
        assert_eq!(value(&frame, 0, "user_name_hash"), Some(hash_identity("alice").as_str()));
        assert_eq!(value(&frame, 1, "logged_in"), Some("false"));
        assert_eq!(value(&frame, 0, "viewport.width"), Some("800"));
        assert_eq!(value(&frame, 1, "viewport.width"), None);
        assert_eq!(value(&frame, 1, "T1"), Some("2"));
        assert_eq!(value(&frame, 0, "T1"), None);
        assert_eq!(value(&frame, 1, "locations"), Some("http://b, http://c"));
        assert_eq!(value(&frame, 1, "site.name"), Some("X"));
        assert_eq!(value(&frame, 0, "subject_id"), Some("10"));
        assert_eq!(outcome.stats.join.unmatched, 0);
    }

    #[test]
    fn test_unmatched_subject_is_kept_and_counted() {
        let c = classifications(&[["1", "99", "bob", "3", "ip", "5", "{}", "[]"]]);
        let s = subjects(&[["10", r#"{"k": "v"}"#, r#"{"0": "http://a"}"#]]);

        let outcome = Pipeline::transform(c, s, &TransformOptions::default()).unwrap();
        assert_eq!(outcome.frame.len(), 1);
        assert_eq!(value(&outcome.frame, 0, "subject_id"), None);
        assert_eq!(value(&outcome.frame, 0, "locations"), None);
        assert_eq!(value(&outcome.frame, 0, "k"), None);
        assert_eq!(outcome.stats.join.unmatched, 1);
        assert_eq!(outcome.stats.join.missing_keys, vec!["99".to_string()]);
    }

    #[test]
    fn test_colliding_columns_get_origin_suffixes() {
        let c = classifications(&[["1", "10", "bob", "3", "ip", "5", r#"{"workflow_id": "m"}"#, "[]"]]);
        let s = subjects(&[["10", r#"{"workflow_id": "s"}"#, "{}"]]);

        let frame = Pipeline::transform(c, s, &TransformOptions::default()).unwrap().frame;
        assert_eq!(value(&frame, 0, "workflow_id_classification"), Some("5"));
        assert_eq!(value(&frame, 0, "workflow_id_metadata"), Some("m"));
        assert_eq!(value(&frame, 0, "workflow_id_subject"), Some("s"));
        assert_eq!(value(&frame, 0, "locations"), Some(""));
    }

    #[test]
    fn test_duplicate_classification_ids_fail() {
        let c = classifications(&[
            ["1", "10", "a", "", "", "5", "{}", "[]"],
            ["1", "10", "b", "", "", "5", "{}", "[]"],
        ]);
        let s = subjects(&[["10", "{}", "{}"]]);
        let err = Pipeline::transform(c, s, &TransformOptions::default()).unwrap_err();
        assert!(matches!(err, ExportError::Integrity(_)));
    }

    #[test]
    fn test_duplicate_subjects_do_not_multiply_rows() {
        let c = classifications(&[["1", "10", "a", "", "", "5", "{}", "[]"]]);
        let s = subjects(&[
            ["10", "{}", r#"{"0": "http://first"}"#],
            ["10", "{}", r#"{"0": "http://second"}"#],
        ]);
        let outcome = Pipeline::transform(c, s, &TransformOptions::default()).unwrap();
        assert_eq!(outcome.frame.len(), 1);
        assert_eq!(outcome.stats.duplicate_subjects_dropped, 1);
        assert_eq!(value(&outcome.frame, 0, "locations"), Some("http://first"));
    }

    #[test]
    fn test_malformed_duplicate_subject_stops_the_run() {
        let c = classifications(&[["1", "10", "a", "", "", "5", "{}", "[]"]]);
        let s = subjects(&[["10", "{}", "{}"], ["10", "{broken", "not json"]]);
        match Pipeline::transform(c, s, &TransformOptions::default()) {
            Err(ExportError::Decode { column, row_id, .. }) => {
                assert_eq!(column, "locations");
                assert_eq!(row_id, "10");
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_workflow_filter() {
        let c = classifications(&[
            ["1", "10", "a", "", "", "5", "{}", "[]"],
            ["2", "10", "b", "", "", "6", "{}", "[]"],
        ]);
        let s = subjects(&[["10", "{}", "{}"]]);
        let options = TransformOptions {
            workflow_id: Some("6".to_string()),
            ..TransformOptions::default()
        };
        let outcome = Pipeline::transform(c, s, &options).unwrap();
        assert_eq!(outcome.frame.ids().collect::<Vec<_>>(), vec!["2"]);
        assert_eq!(outcome.stats.filtered_classifications, 1);
        assert_eq!(outcome.stats.classifications_in, 2);
    }

    #[test]
    fn test_malformed_annotations_stop_the_run() {
        let c = classifications(&[["1", "10", "a", "", "", "5", "{}", "not json"]]);
        let s = subjects(&[["10", "{}", "{}"]]);
        let err = Pipeline::transform(c, s, &TransformOptions::default()).unwrap_err();
        match err {
            ExportError::Decode { column, row_id, .. } => {
                assert_eq!(column, "annotations");
                assert_eq!(row_id, "1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
