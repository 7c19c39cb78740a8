use anyhow::Context;
use axum::body::Body;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracelens_core::config::Config;
use tracelens_core::error::TracelensError;
use tracelens_core::ids::TraceId;
use tracelens_core::model::flame::FlameNode;
use tracelens_core::model::trace::{TraceDetail, TraceListResponse};
use tracelens_core::query::{
    FlameParams, LogsSearchQuery, MetricsRangeQuery, SuggestKind, SuggestRequest,
    TraceListQuery, suggestions_to_json,
};
use tracelens_store::Store;

use crate::error::ApiError;
use crate::proxy::{Relayed, Upstreams};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub upstreams: Upstreams,
}

impl AppState {
    pub fn new(config: &Config) -> tracelens_core::Result<Self> {
        Ok(Self {
            store: Store::new(config)?,
            upstreams: Upstreams::new(config)?,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        let request_id = req
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "http",
            method = %req.method(),
            path = %req.uri().path(),
            request_id
        )
    });

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/metrics/query", post(metrics_query))
        .route("/api/logs/search", post(logs_search))
        .route("/api/traces/list", post(list_traces))
        .route("/api/traces/suggest/services", get(suggest_services))
        .route("/api/traces/suggest/operations", get(suggest_operations))
        .route("/api/traces/suggest/attributes", get(suggest_attributes))
        .route("/api/traces/{trace_id}", get(get_trace))
        .route("/api/traces/{trace_id}/flame", get(flame))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(trace)
        .layer(cors)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// Serves until Ctrl-C.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = AppState::new(&config).context("build upstream clients")?;
    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        trace_store = %config.ch_url,
        database = %config.ch_database,
        "tracelens listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received ctrl-c, shutting down");
            }
        })
        .await
        .context("http server")
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

async fn readyz(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "trace store not ready");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "ok": false, "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

async fn metrics_query(
    State(state): State<AppState>,
    body: Result<Json<MetricsRangeQuery>, JsonRejection>,
) -> Result<Relayed, ApiError> {
    let Json(query) = body?;
    Ok(state.upstreams.query_range(query).await?)
}

async fn logs_search(
    State(state): State<AppState>,
    body: Result<Json<LogsSearchQuery>, JsonRejection>,
) -> Result<Relayed, ApiError> {
    let Json(query) = body?;
    Ok(state.upstreams.search_logs(query).await?)
}

async fn list_traces(
    State(state): State<AppState>,
    body: Result<Json<TraceListQuery>, JsonRejection>,
) -> Result<Json<TraceListResponse>, ApiError> {
    let Json(query) = body?;
    let req = query.resolve(chrono::Utc::now())?;
    Ok(Json(state.store.list_traces(&req).await?))
}

async fn get_trace(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<TraceDetail>, ApiError> {
    let Path(trace_id) = path?;
    let trace_id = TraceId::parse(&trace_id)?;
    Ok(Json(state.store.get_trace(&trace_id).await?))
}

async fn flame(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<FlameParams>, QueryRejection>,
) -> Result<Json<FlameNode>, ApiError> {
    let Path(trace_id) = path?;
    let Query(params) = query?;
    let trace_id = TraceId::parse(&trace_id)?;
    let node = state
        .store
        .flame(&trace_id, params.group_by(), params.mode())
        .await?;
    Ok(Json(node))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SuggestParams {
    q: Option<String>,
    key: Option<String>,
}

async fn suggest_services(
    State(state): State<AppState>,
    query: Result<Query<SuggestParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(params) = query?;
    suggest(&state, SuggestKind::Services, params.q).await
}

async fn suggest_operations(
    State(state): State<AppState>,
    query: Result<Query<SuggestParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(params) = query?;
    suggest(&state, SuggestKind::Operations, params.q).await
}

async fn suggest_attributes(
    State(state): State<AppState>,
    query: Result<Query<SuggestParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(params) = query?;
    let key = params.key.unwrap_or_default();
    if key.trim().is_empty() {
        return Err(TracelensError::InvalidArgument("missing attribute key".into()).into());
    }
    suggest(&state, SuggestKind::Attributes { key }, params.q).await
}

async fn suggest(
    state: &AppState,
    kind: SuggestKind,
    q: Option<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let req = SuggestRequest {
        kind,
        q: q.unwrap_or_default(),
    };
    let items = state.store.suggest(&req).await?;
    Ok(Json(suggestions_to_json(&req.kind, &items)))
}
