//! Canned trace-store rows in JSONEachRow form.

use serde_json::json;

pub const CHECKOUT_TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";

/// Flame rows for a checkout request: `web` calls `cart` and then `pay`.
/// Timestamps are quoted the way the store emits 64-bit integers by default.
pub fn checkout_flame_rows() -> String {
    to_ndjson(&[
        json!({"SpanId": "a1", "ParentSpanId": "", "SpanName": "GET /checkout", "ServiceName": "web",
               "start_ns": "1000000000", "end_ns": "1001000000"}),
        json!({"SpanId": "b2", "ParentSpanId": "a1", "SpanName": "load cart", "ServiceName": "cart",
               "start_ns": "1000100000", "end_ns": "1000300000"}),
        json!({"SpanId": "c3", "ParentSpanId": "a1", "SpanName": "charge", "ServiceName": "pay",
               "start_ns": 1000400000_i64, "end_ns": 1000700000_i64}),
    ])
}

/// Detail rows for the same trace, including attributes of mixed types.
pub fn checkout_detail_rows() -> String {
    to_ndjson(&[
        json!({"TraceId": CHECKOUT_TRACE_ID, "SpanId": "c3", "ParentSpanId": "a1", "SpanName": "charge",
               "SpanKind": "SPAN_KIND_CLIENT", "ServiceName": "pay",
               "start_ns": 1000400000_i64, "end_ns": 1000700000_i64,
               "SpanAttributes": {"http.status_code": 502, "retry": true},
               "StatusCode": "STATUS_CODE_ERROR", "StatusMessage": "gateway"}),
        json!({"TraceId": CHECKOUT_TRACE_ID, "SpanId": "a1", "ParentSpanId": null, "SpanName": "GET /checkout",
               "SpanKind": "SPAN_KIND_SERVER", "ServiceName": "web",
               "start_ns": 1000000000_i64, "end_ns": 1001000000_i64,
               "SpanAttributes": {"http.method": "GET"},
               "StatusCode": "STATUS_CODE_OK", "StatusMessage": ""}),
    ])
}

pub fn trace_root_rows() -> String {
    to_ndjson(&[
        json!({"TraceId": "t1", "StartTs": "2025-01-01 10:00:00", "DurationMs": 1500.0,
               "RootService": "web", "RootOperation": "GET /checkout", "Status": "OK",
               "SpanCount": "12", "TopService": "pay", "TopServiceMs": 900.0}),
        json!({"TraceId": "t2", "StartTs": "2025-01-01 10:05:00", "DurationMs": 1200.0,
               "RootService": "api", "RootOperation": "POST /charge", "Status": "ERROR",
               "SpanCount": 33, "TopService": "payments", "TopServiceMs": 800.0}),
    ])
}

pub fn service_suggest_rows() -> String {
    to_ndjson(&[
        json!({"ServiceName": "checkout", "c": "120"}),
        json!({"ServiceName": "cart", "c": 300}),
    ])
}

pub fn to_ndjson(rows: &[serde_json::Value]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&row.to_string());
        out.push('\n');
    }
    out
}
