//! Nested-to-flat normalization.
//!
//! Nested objects become dot-joined key paths. Arrays and scalars are leaves.
//! The column set of a flattened table is the union of every row's key paths,
//! in first-seen order.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::table::Frame;

const PATH_SEPARATOR: &str = ".";

/// Flatten one object into `path -> leaf` pairs, preserving key order.
///
/// Empty nested objects contribute no columns. A later path that repeats an
/// earlier one overwrites its value.
pub fn flatten_object(object: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into(None, object, &mut out);
    out
}

fn flatten_into(prefix: Option<&str>, object: &Map<String, Value>, out: &mut Map<String, Value>) {
    for (key, value) in object {
        let path = match prefix {
            Some(p) => format!("{p}{PATH_SEPARATOR}{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(nested) => flatten_into(Some(&path), nested, out),
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
}

/// Render a leaf for a delimited cell. `null` is an absent cell.
pub fn render_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Flatten one object per row into a table keyed by the original row ids.
///
/// Rows without a given path get an absent cell in that column. Non-object
/// rows contribute no columns.
pub fn flatten_rows(index: &str, rows: &[(String, Value)]) -> Result<Frame> {
    let flattened: Vec<(&str, Map<String, Value>)> = rows
        .iter()
        .map(|(id, value)| {
            let flat = match value {
                Value::Object(object) => flatten_object(object),
                _ => Map::new(),
            };
            (id.as_str(), flat)
        })
        .collect();

    let mut columns: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for (_, flat) in &flattened {
        for key in flat.keys() {
            if seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }

    let mut frame = Frame::new(index, columns.clone());
    for (id, flat) in &flattened {
        let cells = columns
            .iter()
            .map(|c| flat.get(c).and_then(render_cell))
            .collect();
        frame.push_row(*id, cells)?;
    }
    Ok(frame)
}
