//! Row shapes returned by the trace store and their mapping onto the models
//! served to the UI.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use tracelens_core::model::span::Span;
use tracelens_core::model::trace::TraceSummary;
use tracelens_core::query::{SuggestItem, SuggestKind};

/// ClickHouse may quote 64-bit integers depending on server settings.
#[derive(Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match LenientNumber::deserialize(deserializer)? {
        LenientNumber::Int(v) => Ok(v),
        LenientNumber::Float(v) if v.is_finite() => Ok(v as i64),
        LenientNumber::Float(v) => Err(de::Error::custom(format!("non-finite integer {v}"))),
        LenientNumber::Text(s) => s.trim().parse::<i64>().map_err(de::Error::custom),
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match LenientNumber::deserialize(deserializer)? {
        LenientNumber::Int(v) => Ok(v as f64),
        LenientNumber::Float(v) => Ok(v),
        LenientNumber::Text(s) => s.trim().parse::<f64>().map_err(de::Error::custom),
    }
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = lenient_i64(deserializer)?;
    u64::try_from(v).map_err(|_| de::Error::custom(format!("negative count {v}")))
}

/// A span row. Flame queries fill only the identity and timing columns;
/// detail queries fill everything.
#[derive(Debug, Clone, Deserialize)]
pub struct SpanRow {
    #[serde(rename = "SpanId")]
    pub span_id: String,
    #[serde(rename = "ParentSpanId", default)]
    pub parent_span_id: Option<String>,
    #[serde(rename = "SpanName", default)]
    pub span_name: Option<String>,
    #[serde(rename = "ServiceName", default)]
    pub service_name: Option<String>,
    #[serde(rename = "SpanKind", default)]
    pub span_kind: Option<String>,
    #[serde(rename = "start_ns", deserialize_with = "lenient_i64")]
    pub start_ns: i64,
    #[serde(rename = "end_ns", deserialize_with = "lenient_i64")]
    pub end_ns: i64,
    #[serde(rename = "SpanAttributes", default)]
    pub span_attributes: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(rename = "StatusCode", default)]
    pub status_code: Option<String>,
    #[serde(rename = "StatusMessage", default)]
    pub status_message: Option<String>,
}

impl From<SpanRow> for Span {
    fn from(row: SpanRow) -> Self {
        Span {
            span_id: row.span_id,
            parent_span_id: row.parent_span_id.unwrap_or_default(),
            name: row.span_name.unwrap_or_default(),
            kind: row.span_kind.unwrap_or_default(),
            service: row.service_name.unwrap_or_default(),
            start_unix_nanos: row.start_ns,
            end_unix_nanos: row.end_ns,
            attributes: row
                .span_attributes
                .map(attributes_to_text)
                .unwrap_or_default(),
            status_code: row.status_code.unwrap_or_default(),
            status_message: row.status_message.unwrap_or_default(),
        }
    }
}

/// String values pass through; anything else keeps its JSON text.
pub fn attributes_to_text(
    attrs: serde_json::Map<String, serde_json::Value>,
) -> BTreeMap<String, String> {
    attrs
        .into_iter()
        .map(|(k, v)| {
            let text = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, text)
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraceRootRow {
    #[serde(rename = "TraceId")]
    pub trace_id: String,
    #[serde(rename = "StartTs", default)]
    pub start_ts: String,
    #[serde(rename = "DurationMs", deserialize_with = "lenient_f64")]
    pub duration_ms: f64,
    #[serde(rename = "RootService", default)]
    pub root_service: String,
    #[serde(rename = "RootOperation", default)]
    pub root_operation: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "SpanCount", deserialize_with = "lenient_u64")]
    pub span_count: u64,
    #[serde(rename = "TopService", default)]
    pub top_service: String,
    #[serde(rename = "TopServiceMs", deserialize_with = "lenient_f64", default)]
    pub top_service_ms: f64,
}

impl From<TraceRootRow> for TraceSummary {
    fn from(row: TraceRootRow) -> Self {
        TraceSummary {
            trace_id: row.trace_id,
            start_ts: row.start_ts,
            duration_ms: row.duration_ms,
            root_service: row.root_service,
            root_operation: row.root_operation,
            status: row.status,
            span_count: row.span_count,
            svc_breakdown: vec![(row.top_service, row.top_service_ms)],
        }
    }
}

/// Suggestion rows carry the grouped column under its own name, so they are
/// decoded loosely and picked apart per kind.
pub fn suggest_item(
    kind: &SuggestKind,
    row: &serde_json::Map<String, serde_json::Value>,
) -> Option<SuggestItem> {
    let value = row.get(kind.field())?.as_str()?.to_string();
    let count = match row.get("c") {
        Some(serde_json::Value::Number(n)) => n.as_u64()?,
        Some(serde_json::Value::String(s)) => s.trim().parse::<u64>().ok()?,
        None => 0,
        Some(_) => return None,
    };
    Some(SuggestItem { value, count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_flame_row_with_quoted_integers() {
        let row: SpanRow = serde_json::from_str(
            r#"{"SpanId":"A","ParentSpanId":null,"SpanName":"root","ServiceName":"web","start_ns":"100","end_ns":1000}"#,
        )
        .unwrap();
        let span = Span::from(row);
        assert_eq!(span.span_id, "A");
        assert_eq!(span.parent_span_id, "");
        assert_eq!(span.start_unix_nanos, 100);
        assert_eq!(span.end_unix_nanos, 1000);
        assert!(span.attributes.is_empty());
    }

    #[test]
    fn detail_row_stringifies_non_string_attributes() {
        let row: SpanRow = serde_json::from_str(
            r#"{"TraceId":"T","SpanId":"B","ParentSpanId":"A","SpanName":"db","SpanKind":"CLIENT",
                "ServiceName":"db","start_ns":1,"end_ns":2,
                "SpanAttributes":{"db.system":"mysql","retries":3,"cached":false,"tags":["a"]},
                "StatusCode":"OK","StatusMessage":""}"#,
        )
        .unwrap();
        let span = Span::from(row);
        assert_eq!(span.kind, "CLIENT");
        assert_eq!(span.attributes["db.system"], "mysql");
        assert_eq!(span.attributes["retries"], "3");
        assert_eq!(span.attributes["cached"], "false");
        assert_eq!(span.attributes["tags"], "[\"a\"]");
        assert_eq!(span.status_code, "OK");
    }

    #[test]
    fn rejects_rows_without_timing() {
        assert!(serde_json::from_str::<SpanRow>(r#"{"SpanId":"A"}"#).is_err());
        assert!(
            serde_json::from_str::<SpanRow>(r#"{"SpanId":"A","start_ns":"x","end_ns":1}"#).is_err()
        );
    }

    #[test]
    fn trace_root_row_maps_breakdown() {
        let row: TraceRootRow = serde_json::from_str(
            r#"{"TraceId":"t2","StartTs":"2025-01-01 10:05:00","DurationMs":1200.0,"RootService":"api",
                "RootOperation":"POST /charge","Status":"ERROR","SpanCount":"33","TopService":"payments","TopServiceMs":800.0}"#,
        )
        .unwrap();
        let item = TraceSummary::from(row);
        assert_eq!(item.trace_id, "t2");
        assert_eq!(item.span_count, 33);
        assert_eq!(item.svc_breakdown, vec![("payments".to_string(), 800.0)]);
    }

    #[test]
    fn suggest_item_reads_grouped_field() {
        let row: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(r#"{"ServiceName":"checkout","c":"120"}"#).unwrap();
        let item = suggest_item(&SuggestKind::Services, &row).unwrap();
        assert_eq!(item.value, "checkout");
        assert_eq!(item.count, 120);

        assert!(suggest_item(&SuggestKind::Operations, &row).is_none());

        let key = SuggestKind::Attributes {
            key: "http.method".into(),
        };
        let row: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(r#"{"Val":"GET"}"#).unwrap();
        assert_eq!(suggest_item(&key, &row).unwrap().count, 0);
    }
}
