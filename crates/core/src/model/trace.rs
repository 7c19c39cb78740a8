use serde::{Deserialize, Serialize};

use crate::model::span::Span;

/// One row of the trace list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    pub trace_id: String,
    pub start_ts: String,
    pub duration_ms: f64,
    pub root_service: String,
    pub root_operation: String,
    pub status: String,
    pub span_count: u64,
    /// `(service, durationMs)` pairs; the list source only reports the top contributor.
    pub svc_breakdown: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceListResponse {
    pub items: Vec<TraceSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceDetail {
    pub trace_id: String,
    pub spans: Vec<Span>,
}
