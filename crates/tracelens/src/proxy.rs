//! Pass-through to the metrics and logs backends. Both relay the upstream
//! status and body unchanged.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use reqwest::Client;
use tracelens_core::config::Config;
use tracelens_core::error::{Result, TracelensError};
use tracelens_core::query::{LogsSearchQuery, MetricsRangeQuery};

const METRICS_UPSTREAM: &str = "metrics backend";
const LOGS_UPSTREAM: &str = "logs backend";

#[derive(Debug, Clone)]
pub struct Upstreams {
    http: Client,
    prom_url: String,
    vlogs_url: String,
}

/// An upstream answer forwarded to the caller as JSON.
#[derive(Debug)]
pub struct Relayed {
    pub status: u16,
    pub body: Bytes,
}

impl IntoResponse for Relayed {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);
        (status, [(header::CONTENT_TYPE, "application/json")], self.body).into_response()
    }
}

impl Upstreams {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|e| TracelensError::Internal(format!("build proxy client: {e}")))?;
        Ok(Self {
            http,
            prom_url: config.prom_url.clone(),
            vlogs_url: config.vlogs_url.clone(),
        })
    }

    /// `GET <prom_url>/api/v1/query_range` with defaults applied for the window.
    pub async fn query_range(&self, query: MetricsRangeQuery) -> Result<Relayed> {
        let query = query.with_defaults(chrono::Utc::now());
        let params = [
            ("query", query.query.clone()),
            ("start", query.start.unwrap_or_default().to_string()),
            ("end", query.end.unwrap_or_default().to_string()),
            ("step", query.step.unwrap_or_default().to_string()),
        ];
        let url = format!("{}/api/v1/query_range", self.prom_url);
        tracing::debug!(query = %query.query, "proxying metrics range query");
        let response = self
            .http
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|e| unreachable(METRICS_UPSTREAM, e))?;
        relay(METRICS_UPSTREAM, response).await
    }

    /// Form-encoded `POST <vlogs_url>/select/logsql/query`.
    pub async fn search_logs(&self, query: LogsSearchQuery) -> Result<Relayed> {
        let url = format!("{}/select/logsql/query", self.vlogs_url);
        tracing::debug!(query = %query.query, "proxying logs query");
        let response = self
            .http
            .post(url)
            .form(&[("query", query.query.as_str())])
            .send()
            .await
            .map_err(|e| unreachable(LOGS_UPSTREAM, e))?;
        relay(LOGS_UPSTREAM, response).await
    }
}

async fn relay(upstream: &'static str, response: reqwest::Response) -> Result<Relayed> {
    let status = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .map_err(|e| unreachable(upstream, e))?;
    if status >= 400 {
        tracing::warn!(upstream, status, "upstream returned an error");
    }
    Ok(Relayed { status, body })
}

fn unreachable(upstream: &'static str, err: reqwest::Error) -> TracelensError {
    TracelensError::UpstreamUnreachable {
        upstream,
        message: err.to_string(),
    }
}
