use serde_json::Value;
use tracing::debug;

use crate::error::{ExportError, Result};
use crate::table::Frame;

/// Top-level JSON shape a structured column is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Object,
    Array,
}

impl Shape {
    fn matches(self, value: &Value) -> bool {
        match self {
            Shape::Object => value.is_object(),
            Shape::Array => value.is_array(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Shape::Object => "a JSON object",
            Shape::Array => "a JSON array",
        }
    }
}

/// A structured column decoded from its textual form, still keyed by row id.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedColumn {
    pub name: String,
    pub values: Vec<(String, Value)>,
}

impl DecodedColumn {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Decode a single cell. An empty cell is malformed, never an empty structure.
pub fn decode_cell(column: &str, row_id: &str, text: Option<&str>, shape: Shape) -> Result<Value> {
    let text = text
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ExportError::decode(column, row_id, "empty value"))?;

    let value: Value = serde_json::from_str(text)
        .map_err(|e| ExportError::decode(column, row_id, e.to_string()))?;

    if !shape.matches(&value) {
        return Err(ExportError::decode(
            column,
            row_id,
            format!("expected {}", shape.describe()),
        ));
    }
    Ok(value)
}

/// Decode every cell of `column`, stopping at the first malformed row.
///
/// The frame keeps its textual column; callers drop or replace it once the
/// structured values have been consumed.
pub fn decode_column(frame: &Frame, table: &str, column: &str, shape: Shape) -> Result<DecodedColumn> {
    frame.require_column(table, column)?;
    let cells = frame.column_values(column).unwrap_or_default();

    let mut values = Vec::with_capacity(cells.len());
    for (row_id, text) in cells {
        let value = decode_cell(column, row_id, text, shape)?;
        values.push((row_id.to_string(), value));
    }

    debug!(table, column, rows = values.len(), "Decoded structured column");
    Ok(DecodedColumn {
        name: column.to_string(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame_with(cells: Vec<Option<&str>>) -> Frame {
        let mut frame = Frame::new("id", vec!["metadata".to_string()]);
        for (i, c) in cells.into_iter().enumerate() {
            frame
                .push_row((i + 1).to_string(), vec![c.map(str::to_string)])
                .unwrap();
        }
        frame
    }

    #[test]
    fn test_decodes_objects_keyed_by_row() {
        let frame = frame_with(vec![Some(r#"{"a": {"b": 1}}"#), Some("{}")]);
        let decoded = decode_column(&frame, "t", "metadata", Shape::Object).unwrap();
        assert_eq!(decoded.name, "metadata");
        assert_eq!(
            decoded.values,
            vec![
                ("1".to_string(), json!({"a": {"b": 1}})),
                ("2".to_string(), json!({}))
            ]
        );
    }

    #[test]
    fn test_invalid_json_reports_row() {
        let frame = frame_with(vec![Some("{}"), Some("{not json")]);
        let err = decode_column(&frame, "t", "metadata", Shape::Object).unwrap_err();
        match err {
            ExportError::Decode { column, row_id, .. } => {
                assert_eq!(column, "metadata");
                assert_eq!(row_id, "2");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_cell_is_not_silently_empty() {
        let frame = frame_with(vec![None]);
        let err = decode_column(&frame, "t", "metadata", Shape::Object).unwrap_err();
        assert!(err.to_string().contains("empty value"));
    }

    #[test]
    fn test_wrong_shape_is_decode_error() {
        let err = decode_cell("annotations", "7", Some(r#"{"task": "T0"}"#), Shape::Array).unwrap_err();
        assert!(err.to_string().contains("expected a JSON array"));
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let frame = frame_with(vec![Some("{}")]);
        let err = decode_column(&frame, "subjects", "locations", Shape::Object).unwrap_err();
        assert!(matches!(err, ExportError::Schema { .. }));
    }
}
