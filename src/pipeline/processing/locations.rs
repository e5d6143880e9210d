use serde_json::{Map, Value};

use crate::constants::LOCATION_SEPARATOR;

/// Join every resource address of a subject, in the mapping's order.
///
/// An empty mapping yields an empty string. Non-string addresses are kept
/// in their JSON form.
pub fn collapse_locations(locations: &Map<String, Value>) -> String {
    locations
        .values()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(LOCATION_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collapse(value: Value) -> String {
        collapse_locations(value.as_object().unwrap())
    }

    #[test]
    fn test_single_location_has_no_trailing_delimiter() {
        assert_eq!(collapse(json!({"0": "http://a"})), "http://a");
    }

    #[test]
    fn test_multiple_locations_are_joined() {
        assert_eq!(
            collapse(json!({"0": "http://a", "1": "http://b"})),
            "http://a, http://b"
        );
    }

    #[test]
    fn test_empty_mapping_is_empty_string() {
        assert_eq!(collapse(json!({})), "");
    }

    #[test]
    fn test_order_follows_mapping_not_key_value() {
        let locations: Map<String, Value> =
            serde_json::from_str(r#"{"1": "http://second", "0": "http://first"}"#).unwrap();
        assert_eq!(collapse_locations(&locations), "http://second, http://first");
    }
}
