//! JSON output formatting
//!
//! JSON is the default output format.

use serde::Serialize;

/// Format a result as pretty-printed JSON
pub fn format_json<T: Serialize>(result: &T) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|e| {
        format!(
            r#"{{"error": true, "code": "SERIALIZATION_ERROR", "message": "{}"}}"#,
            e
        )
    })
}

/// Format a result as compact JSON (single line)
pub fn format_json_compact<T: Serialize>(result: &T) -> String {
    serde_json::to_string(result).unwrap_or_else(|e| {
        format!(
            r#"{{"error":true,"code":"SERIALIZATION_ERROR","message":"{}"}}"#,
            e
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ErrorResponse;

    #[test]
    fn test_error_response_shape() {
        let json = format_json_compact(&ErrorResponse::new("INVALID_PATTERN", "bad").with_position(Some(2)));
        assert_eq!(
            json,
            r#"{"error":true,"code":"INVALID_PATTERN","message":"bad","position":2}"#
        );
    }

    #[test]
    fn test_position_omitted_when_absent() {
        let json = format_json_compact(&ErrorResponse::new("COMMAND_ERROR", "x"));
        assert!(!json.contains("position"));
    }
}
