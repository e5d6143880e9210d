use serde_json::{Map, Value};

use crate::constants;
use crate::error::{ExportError, Result};

const TASK_KEY: &str = "task";
const VALUE_KEY: &str = "value";

/// Collapse a row's ordered task descriptors into `task -> value`.
///
/// Task labels are discarded. When a task identifier repeats within the row
/// the later descriptor wins, but the task keeps the column position of its
/// first appearance. A descriptor without a `value` maps to `null`.
pub fn extract_task_values(row_id: &str, annotations: &Value) -> Result<Map<String, Value>> {
    let descriptors = annotations.as_array().ok_or_else(|| {
        ExportError::decode(constants::ANNOTATIONS, row_id, "expected a JSON array")
    })?;

    let mut values = Map::new();
    for (position, descriptor) in descriptors.iter().enumerate() {
        let descriptor = descriptor.as_object().ok_or_else(|| {
            ExportError::decode(
                constants::ANNOTATIONS,
                row_id,
                format!("annotation {position} is not an object"),
            )
        })?;
        let task = match descriptor.get(TASK_KEY) {
            Some(Value::String(task)) if !task.is_empty() => task.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(ExportError::decode(
                    constants::ANNOTATIONS,
                    row_id,
                    format!("annotation {position} has no task identifier"),
                ))
            }
        };
        let value = descriptor.get(VALUE_KEY).cloned().unwrap_or(Value::Null);
        values.insert(task, value);
    }
    Ok(values)
}
