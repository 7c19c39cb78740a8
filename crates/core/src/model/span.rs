use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One timed unit of work within a trace, as served to the UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub span_id: String,
    /// Empty when the span has no parent.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_span_id: String,
    pub name: String,
    #[serde(default)]
    pub kind: String,
    pub service: String,
    pub start_unix_nanos: i64,
    pub end_unix_nanos: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_message: String,
}

impl Span {
    /// Raw `end - start`; negative for malformed rows.
    pub fn duration_nanos(&self) -> i64 {
        self.end_unix_nanos.saturating_sub(self.start_unix_nanos)
    }

    /// Duration in whole microseconds, truncated, with negative durations clamped to zero.
    pub fn duration_micros(&self) -> u64 {
        u64::try_from(self.duration_nanos() / 1000).unwrap_or(0)
    }

    pub fn has_parent(&self) -> bool {
        !self.parent_span_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_truncates_to_micros() {
        let span = Span {
            start_unix_nanos: 0,
            end_unix_nanos: 1_999,
            ..Span::default()
        };
        assert_eq!(span.duration_micros(), 1);
    }

    #[test]
    fn negative_duration_clamps_to_zero() {
        let span = Span {
            start_unix_nanos: 5_000,
            end_unix_nanos: 1_000,
            ..Span::default()
        };
        assert_eq!(span.duration_nanos(), -4_000);
        assert_eq!(span.duration_micros(), 0);
    }

    #[test]
    fn wire_shape_omits_empty_optionals() {
        let span = Span {
            span_id: "a".into(),
            name: "GET /".into(),
            service: "web".into(),
            end_unix_nanos: 10,
            ..Span::default()
        };
        let json = serde_json::to_value(&span).unwrap();
        assert_eq!(json["spanId"], "a");
        assert_eq!(json["endUnixNanos"], 10);
        assert!(json.get("parentSpanId").is_none());
        assert!(json.get("attributes").is_none());
        assert!(json.get("statusCode").is_none());
    }
}
