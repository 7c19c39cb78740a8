use std::cmp::Reverse;

use tracelens_core::error::Result;
use tracelens_core::filter::{FlameMode, GroupBy};
use tracelens_core::flame::flame_graph;
use tracelens_core::ids::TraceId;
use tracelens_core::model::flame::FlameNode;
use tracelens_core::model::span::Span;
use tracelens_core::model::trace::{TraceDetail, TraceListResponse, TraceSummary};
use tracelens_core::query::{SUGGEST_LIMIT, SuggestItem, SuggestKind, SuggestRequest, TraceListRequest};
use tracelens_core::tree::index_by_id;

use crate::Store;
use crate::rows::{SpanRow, TraceRootRow, suggest_item};
use crate::schema::{
    ATTR_VALUES_TABLE, DETAIL_SPAN_COLUMNS, FLAME_SPAN_COLUMNS, OPERATION_SUGGEST_TABLE,
    SERVICE_SUGGEST_TABLE, SPANS_TABLE, SUGGEST_WINDOW, TRACE_ROOTS_COLUMNS, TRACE_ROOTS_TABLE,
    TRACE_ROOTS_TIME_COLUMN,
};
use crate::sql::{BuiltQuery, contains_pattern, quoted_list};

impl Store {
    pub async fn list_traces(&self, req: &TraceListRequest) -> Result<TraceListResponse> {
        let query = trace_list_query(self.database(), req)?;
        let rows = self.query_rows::<TraceRootRow>(&query).await?;
        tracing::debug!(rows = rows.rows.len(), dropped = rows.dropped, "listed traces");
        Ok(TraceListResponse {
            items: rows.rows.into_iter().map(TraceSummary::from).collect(),
        })
    }

    /// All spans of one trace, ordered by start time then span id. A trace
    /// with no stored spans yields an empty list.
    pub async fn get_trace(&self, trace_id: &TraceId) -> Result<TraceDetail> {
        let query = trace_spans_query(self.database(), trace_id);
        let rows = self.query_rows::<SpanRow>(&query).await?;
        let mut spans = rows.rows.into_iter().map(Span::from).collect::<Vec<_>>();
        spans.sort_by(|a, b| {
            a.start_unix_nanos
                .cmp(&b.start_unix_nanos)
                .then_with(|| a.span_id.cmp(&b.span_id))
        });
        Ok(TraceDetail {
            trace_id: trace_id.to_string(),
            spans,
        })
    }

    pub async fn flame(
        &self,
        trace_id: &TraceId,
        group_by: GroupBy,
        mode: FlameMode,
    ) -> Result<FlameNode> {
        let query = flame_spans_query(self.database(), trace_id);
        let rows = self.query_rows::<SpanRow>(&query).await?;
        let spans = index_by_id(rows.rows.into_iter().map(Span::from));
        tracing::debug!(
            trace_id = %trace_id,
            spans = spans.len(),
            dropped = rows.dropped,
            "building flame graph"
        );
        Ok(flame_graph(trace_id.as_str(), &spans, group_by, mode))
    }

    /// At most `SUGGEST_LIMIT` values, most frequent first.
    pub async fn suggest(&self, req: &SuggestRequest) -> Result<Vec<SuggestItem>> {
        let query = suggest_query(self.database(), req);
        let rows = self
            .query_rows::<serde_json::Map<String, serde_json::Value>>(&query)
            .await?;
        let mut items = rows
            .rows
            .iter()
            .filter_map(|row| suggest_item(&req.kind, row))
            .collect::<Vec<_>>();
        items.sort_by(|a, b| {
            Reverse(a.count)
                .cmp(&Reverse(b.count))
                .then_with(|| a.value.cmp(&b.value))
        });
        items.truncate(SUGGEST_LIMIT as usize);
        Ok(items)
    }
}

pub fn trace_list_query(database: &str, req: &TraceListRequest) -> Result<BuiltQuery> {
    let mut predicates = vec![format!(
        "{TRACE_ROOTS_TIME_COLUMN} BETWEEN toDateTime({{from:Int64}}) AND toDateTime({{to:Int64}})"
    )];
    for (column, values) in [
        ("RootService", &req.services),
        ("RootOperation", &req.operations),
        ("Status", &req.statuses),
    ] {
        if !values.is_empty() {
            predicates.push(format!("{column} IN ({})", quoted_list(values)?));
        }
    }
    if req.duration_gte_ms.is_some() {
        predicates.push("DurationMs >= {duration_gte:Float64}".to_string());
    }
    if req.duration_lte_ms.is_some() {
        predicates.push("DurationMs <= {duration_lte:Float64}".to_string());
    }

    let sql = format!(
        "SELECT {TRACE_ROOTS_COLUMNS}\nFROM {{db:Identifier}}.{TRACE_ROOTS_TABLE}\nWHERE {}\nORDER BY {} {}\nLIMIT {}",
        predicates.join("\n  AND "),
        req.sort_field.column(),
        req.sort_direction.keyword(),
        req.limit,
    );

    let mut query = BuiltQuery::new(sql)
        .bind("db", database)
        .bind("from", req.from)
        .bind("to", req.to);
    if let Some(gte) = req.duration_gte_ms {
        query = query.bind("duration_gte", gte);
    }
    if let Some(lte) = req.duration_lte_ms {
        query = query.bind("duration_lte", lte);
    }
    Ok(query)
}

pub fn flame_spans_query(database: &str, trace_id: &TraceId) -> BuiltQuery {
    spans_query(database, trace_id, FLAME_SPAN_COLUMNS)
}

pub fn trace_spans_query(database: &str, trace_id: &TraceId) -> BuiltQuery {
    spans_query(database, trace_id, DETAIL_SPAN_COLUMNS)
}

fn spans_query(database: &str, trace_id: &TraceId, columns: &str) -> BuiltQuery {
    let sql = format!(
        "SELECT {columns}\nFROM {{db:Identifier}}.{SPANS_TABLE}\nWHERE lower(TraceId) = {{trace_id:String}}\nORDER BY start_ns ASC, SpanId ASC"
    );
    BuiltQuery::new(sql)
        .bind("db", database)
        .bind("trace_id", trace_id.as_str())
}

pub fn suggest_query(database: &str, req: &SuggestRequest) -> BuiltQuery {
    let field = req.kind.field();
    let table = match &req.kind {
        SuggestKind::Services => SERVICE_SUGGEST_TABLE,
        SuggestKind::Operations => OPERATION_SUGGEST_TABLE,
        SuggestKind::Attributes { .. } => ATTR_VALUES_TABLE,
    };

    let mut predicates = vec![format!("WindowStart > now() - {SUGGEST_WINDOW}")];
    if matches!(req.kind, SuggestKind::Attributes { .. }) {
        predicates.push("Key = {key:String}".to_string());
    }
    let q = req.q.trim();
    if !q.is_empty() {
        predicates.push(format!("{field} ILIKE {{pattern:String}}"));
    }

    let sql = format!(
        "SELECT {field}, sum(Cnt) AS c\nFROM {{db:Identifier}}.{table}\nWHERE {}\nGROUP BY {field}\nORDER BY c DESC, {field} ASC\nLIMIT {SUGGEST_LIMIT}",
        predicates.join(" AND "),
    );

    let mut query = BuiltQuery::new(sql).bind("db", database);
    if let SuggestKind::Attributes { key } = &req.kind {
        query = query.bind("key", key);
    }
    if !q.is_empty() {
        query = query.bind("pattern", contains_pattern(q));
    }
    query
}
