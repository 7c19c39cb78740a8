use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TracelensError};
use crate::filter::{FlameMode, GroupBy, SortDirection, SortField};
use crate::time::{parse_time_or_relative_at, resolve_window};

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 500;
pub const SUGGEST_LIMIT: u32 = 20;
pub const DEFAULT_METRICS_STEP_SECS: f64 = 60.0;

/// A time bound as sent by the UI: Unix seconds, or RFC 3339 / relative text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TimeBound {
    Seconds(f64),
    Text(String),
}

impl TimeBound {
    /// `None` when the bound is unset (`0` or empty text).
    fn to_unix_secs(&self, now: DateTime<Utc>) -> Result<Option<i64>> {
        match self {
            Self::Seconds(v) => seconds_bound(*v),
            Self::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(None);
                }
                if let Ok(v) = s.parse::<f64>() {
                    return seconds_bound(v);
                }
                let ts = parse_time_or_relative_at(s, now)
                    .map_err(|e| TracelensError::InvalidArgument(e.to_string()))?;
                Ok(Some(ts.timestamp()))
            }
        }
    }
}

fn seconds_bound(v: f64) -> Result<Option<i64>> {
    if !v.is_finite() {
        return Err(TracelensError::InvalidArgument(format!(
            "time bound must be finite, got {v}"
        )));
    }
    if v == 0.0 {
        return Ok(None);
    }
    Ok(Some(v as i64))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DurationRange {
    pub gte: Option<f64>,
    pub lte: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TraceFilters {
    pub service: Option<Vec<String>>,
    pub operation: Option<Vec<String>>,
    pub status: Option<Vec<String>>,
    #[serde(rename = "durationMs")]
    pub duration_ms: DurationRange,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SortSpec {
    pub by: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PageSpec {
    pub size: Option<i64>,
}

/// Body of `POST /api/traces/list`, exactly as the UI sends it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TraceListQuery {
    pub from: Option<TimeBound>,
    pub to: Option<TimeBound>,
    pub filters: TraceFilters,
    pub sort: SortSpec,
    pub page: PageSpec,
}

/// A trace-list request with every default applied and every input bounded.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceListRequest {
    pub from: i64,
    pub to: i64,
    pub services: Vec<String>,
    pub operations: Vec<String>,
    pub statuses: Vec<String>,
    pub duration_gte_ms: Option<f64>,
    pub duration_lte_ms: Option<f64>,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
    pub limit: u32,
}

impl TraceListQuery {
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<TraceListRequest> {
        let to = self
            .to
            .as_ref()
            .map(|b| b.to_unix_secs(now))
            .transpose()?
            .flatten();
        let from = self
            .from
            .as_ref()
            .map(|b| b.to_unix_secs(now))
            .transpose()?
            .flatten();
        let (from, to) = resolve_window(from, to, now);

        let duration = &self.filters.duration_ms;
        for bound in [duration.gte, duration.lte].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(TracelensError::InvalidArgument(format!(
                    "duration bound must be finite, got {bound}"
                )));
            }
        }

        Ok(TraceListRequest {
            from,
            to,
            services: self.filters.service.clone().unwrap_or_default(),
            operations: self.filters.operation.clone().unwrap_or_default(),
            statuses: self.filters.status.clone().unwrap_or_default(),
            duration_gte_ms: duration.gte,
            duration_lte_ms: duration.lte,
            sort_field: self
                .sort
                .by
                .as_deref()
                .map(SortField::parse)
                .unwrap_or_default(),
            sort_direction: self
                .sort
                .order
                .as_deref()
                .map(SortDirection::parse)
                .unwrap_or_default(),
            limit: clamp_page_size(self.page.size),
        })
    }
}

/// Page sizes outside `[1, MAX_PAGE_SIZE]` reset to the default rather than saturating.
pub fn clamp_page_size(size: Option<i64>) -> u32 {
    match size {
        Some(n) if n >= 1 && n <= i64::from(MAX_PAGE_SIZE) => n as u32,
        _ => DEFAULT_PAGE_SIZE,
    }
}

/// Query string of `GET /api/traces/{id}/flame`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlameParams {
    pub group_by: Option<String>,
    pub mode: Option<String>,
}

impl FlameParams {
    pub fn group_by(&self) -> GroupBy {
        self.group_by.as_deref().map(GroupBy::parse).unwrap_or_default()
    }

    pub fn mode(&self) -> FlameMode {
        self.mode.as_deref().map(FlameMode::parse).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestKind {
    Services,
    Operations,
    Attributes { key: String },
}

impl SuggestKind {
    /// Name of the grouped column, which is also the field name in the response.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Services => "ServiceName",
            Self::Operations => "SpanName",
            Self::Attributes { .. } => "Val",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestRequest {
    pub kind: SuggestKind,
    /// Case-insensitive substring to match; empty matches everything.
    pub q: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestItem {
    pub value: String,
    pub count: u64,
}

/// Renders suggestions as `[{"<field>": value, "c": count}, ...]`.
pub fn suggestions_to_json(kind: &SuggestKind, items: &[SuggestItem]) -> serde_json::Value {
    let field = kind.field();
    serde_json::Value::Array(
        items
            .iter()
            .map(|item| {
                let mut obj = serde_json::Map::new();
                obj.insert(field.to_string(), serde_json::Value::from(item.value.clone()));
                obj.insert("c".to_string(), serde_json::Value::from(item.count));
                serde_json::Value::Object(obj)
            })
            .collect(),
    )
}

/// Body of `POST /api/metrics/query`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsRangeQuery {
    pub query: String,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub step: Option<f64>,
}

impl MetricsRangeQuery {
    /// Fills missing (or zero) `end`, `start` and `step` with a trailing-hour window.
    pub fn with_defaults(mut self, now: DateTime<Utc>) -> Self {
        let end = match self.end {
            Some(v) if v != 0.0 => v,
            _ => now.timestamp() as f64,
        };
        let start = match self.start {
            Some(v) if v != 0.0 => v,
            _ => end - 3600.0,
        };
        let step = match self.step {
            Some(v) if v != 0.0 => v,
            _ => DEFAULT_METRICS_STEP_SECS,
        };
        self.end = Some(end);
        self.start = Some(start);
        self.step = Some(step);
        self
    }
}

/// Body of `POST /api/logs/search`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogsSearchQuery {
    pub query: String,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn parses_ui_body() {
        let body = r#"{
            "from": 1704103200, "to": 1704106800,
            "filters": { "status": ["ERROR"], "durationMs": { "gte": 250 } },
            "sort": { "by": "start", "order": "ASC" },
            "page": { "size": 50 }
        }"#;
        let query: TraceListQuery = serde_json::from_str(body).unwrap();
        let req = query.resolve(now()).unwrap();
        assert_eq!(req.from, 1_704_103_200);
        assert_eq!(req.to, 1_704_106_800);
        assert_eq!(req.statuses, vec!["ERROR".to_string()]);
        assert!(req.services.is_empty());
        assert_eq!(req.duration_gte_ms, Some(250.0));
        assert_eq!(req.duration_lte_ms, None);
        assert_eq!(req.sort_field, SortField::Start);
        assert_eq!(req.sort_direction, SortDirection::Asc);
        assert_eq!(req.limit, 50);
    }

    #[test]
    fn empty_body_gets_defaults() {
        let query: TraceListQuery = serde_json::from_str("{}").unwrap();
        let req = query.resolve(now()).unwrap();
        assert_eq!(req.to, now().timestamp());
        assert_eq!(req.from, now().timestamp() - 3600);
        assert_eq!(req.sort_field, SortField::Duration);
        assert_eq!(req.sort_direction, SortDirection::Desc);
        assert_eq!(req.limit, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn zero_bounds_are_unset() {
        let query: TraceListQuery = serde_json::from_str(r#"{"from": 0, "to": 5000}"#).unwrap();
        let req = query.resolve(now()).unwrap();
        assert_eq!((req.from, req.to), (1400, 5000));
    }

    #[test]
    fn text_bounds_accept_relative_and_rfc3339() {
        let query: TraceListQuery =
            serde_json::from_str(r#"{"from": "15m", "to": "2026-02-01T00:00:00Z"}"#).unwrap();
        let req = query.resolve(now()).unwrap();
        assert_eq!(req.to, now().timestamp());
        assert_eq!(req.from, now().timestamp() - 900);

        let bad: TraceListQuery = serde_json::from_str(r#"{"from": "yesterday-ish"}"#).unwrap();
        assert!(matches!(
            bad.resolve(now()),
            Err(TracelensError::InvalidArgument(_))
        ));
    }

    #[test]
    fn page_size_out_of_range_resets_to_default() {
        assert_eq!(clamp_page_size(Some(0)), 100);
        assert_eq!(clamp_page_size(Some(-5)), 100);
        assert_eq!(clamp_page_size(Some(10_000)), 100);
        assert_eq!(clamp_page_size(Some(501)), 100);
        assert_eq!(clamp_page_size(None), 100);
        assert_eq!(clamp_page_size(Some(1)), 1);
        assert_eq!(clamp_page_size(Some(500)), 500);
    }

    #[test]
    fn null_filter_lists_are_empty() {
        let query: TraceListQuery =
            serde_json::from_str(r#"{"filters": {"service": null, "operation": ["a"]}}"#).unwrap();
        let req = query.resolve(now()).unwrap();
        assert!(req.services.is_empty());
        assert_eq!(req.operations, vec!["a".to_string()]);
    }

    #[test]
    fn flame_params_default() {
        let params = FlameParams::default();
        assert_eq!(params.group_by(), GroupBy::ServiceOperation);
        assert_eq!(params.mode(), FlameMode::Total);
    }

    #[test]
    fn suggestions_use_grouped_field_name() {
        let json = suggestions_to_json(
            &SuggestKind::Services,
            &[SuggestItem {
                value: "checkout".into(),
                count: 120,
            }],
        );
        assert_eq!(json, serde_json::json!([{"ServiceName": "checkout", "c": 120}]));
    }

    #[test]
    fn metrics_defaults_fill_trailing_hour() {
        let q = MetricsRangeQuery {
            query: "up".into(),
            ..MetricsRangeQuery::default()
        }
        .with_defaults(now());
        let end = now().timestamp() as f64;
        assert_eq!(q.end, Some(end));
        assert_eq!(q.start, Some(end - 3600.0));
        assert_eq!(q.step, Some(60.0));

        let q = MetricsRangeQuery {
            query: "up".into(),
            start: Some(10.0),
            end: Some(20.0),
            step: Some(5.0),
        }
        .with_defaults(now());
        assert_eq!((q.start, q.end, q.step), (Some(10.0), Some(20.0), Some(5.0)));
    }
}
