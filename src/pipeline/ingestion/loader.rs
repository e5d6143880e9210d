use std::collections::HashSet;

use tracing::{debug, info};

use crate::constants;
use crate::error::{ExportError, Result};
use crate::table::Frame;

/// Shape an input table must have before it is accepted.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: &'static str,
    pub index: &'static str,
    pub required: Vec<&'static str>,
}

impl TableSpec {
    pub fn classifications() -> Self {
        Self {
            name: constants::CLASSIFICATIONS_TABLE,
            index: constants::CLASSIFICATION_ID,
            required: constants::required_classification_columns(),
        }
    }

    pub fn subjects() -> Self {
        Self {
            name: constants::SUBJECTS_TABLE,
            index: constants::SUBJECT_ID,
            required: constants::required_subject_columns(),
        }
    }
}

/// Parse delimited text with a header row into a [`Frame`] keyed by `spec.index`.
///
/// Empty cells become `None`. Every required column must be present in the
/// header, and the table must hold at least one data row.
pub fn read_frame(bytes: &[u8], spec: &TableSpec) -> Result<Frame> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            // Spreadsheet exports often prefix the first header with a BOM
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();

    let mut seen = HashSet::new();
    for h in &headers {
        if !seen.insert(h.as_str()) {
            return Err(ExportError::Integrity(format!(
                "{} table has duplicate column '{}'",
                spec.name, h
            )));
        }
    }
    for required in &spec.required {
        if !seen.contains(required) {
            return Err(ExportError::schema(spec.name, *required));
        }
    }
    let index_pos = headers
        .iter()
        .position(|h| h == spec.index)
        .ok_or_else(|| ExportError::schema(spec.name, spec.index))?;

    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index_pos)
        .map(|(_, h)| h.clone())
        .collect();
    let mut frame = Frame::new(spec.index, columns);

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let id = record.get(index_pos).unwrap_or("").trim();
        if id.is_empty() {
            return Err(ExportError::Integrity(format!(
                "{} row {} has an empty {}",
                spec.name,
                line + 1,
                spec.index
            )));
        }
        let cells = record
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index_pos)
            .map(|(_, v)| if v.is_empty() { None } else { Some(v.to_string()) })
            .collect();
        frame.push_row(id, cells)?;
    }

    if frame.is_empty() {
        return Err(ExportError::input(spec.name, "header present but no data rows"));
    }

    debug!(table = spec.name, columns = ?frame.columns(), "Parsed header");
    info!("📥 Loaded {} {} rows", frame.len(), spec.name);
    Ok(frame)
}
