//! Tables and columns of the trace store, as laid out by the OpenTelemetry
//! ClickHouse exporter plus the materialized views feeding the trace list and
//! suggestions.

pub const SPANS_TABLE: &str = "otel_traces";

pub const TRACE_ROOTS_TABLE: &str = "trace_roots";
pub const TRACE_ROOTS_TIME_COLUMN: &str = "StartTs";
pub const TRACE_ROOTS_COLUMNS: &str = "TraceId, StartTs, DurationMs, RootService, RootOperation, Status, SpanCount, TopService, TopServiceMs";

pub const SERVICE_SUGGEST_TABLE: &str = "service_suggest";
pub const OPERATION_SUGGEST_TABLE: &str = "operation_suggest";
pub const ATTR_VALUES_TABLE: &str = "attr_values";
pub const SUGGEST_WINDOW: &str = "INTERVAL 24 HOUR";

/// Span columns used for the flame graph. `Duration` is stored in milliseconds
/// by the ingest pipeline.
pub const FLAME_SPAN_COLUMNS: &str = "SpanId,
  ifNull(ParentSpanId, '') AS ParentSpanId,
  SpanName,
  ServiceName,
  toInt64(toUnixTimestamp64Nano(Timestamp)) AS start_ns,
  toInt64(toUnixTimestamp64Nano(Timestamp) + (Duration * 1000000)) AS end_ns";

/// Span columns used for the span detail view.
pub const DETAIL_SPAN_COLUMNS: &str = "TraceId,
  SpanId,
  ifNull(ParentSpanId, '') AS ParentSpanId,
  SpanName,
  SpanKind,
  ServiceName,
  toInt64(toUnixTimestamp64Nano(Timestamp)) AS start_ns,
  toInt64(toUnixTimestamp64Nano(Timestamp) + (Duration * 1000000)) AS end_ns,
  SpanAttributes,
  StatusCode,
  StatusMessage";
