//! Test helpers: a fake HTTP upstream standing in for the trace store and the
//! metrics/logs backends, plus canned trace-store rows.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::form_urlencoded;

pub mod fixtures;

/// One request as seen by the fake upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
}

impl RecordedRequest {
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Form fields of an `application/x-www-form-urlencoded` body.
    pub fn form(&self) -> HashMap<String, String> {
        form_urlencoded::parse(self.body.as_bytes())
            .into_owned()
            .collect()
    }
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    status: u16,
    body: String,
}

#[derive(Default)]
struct Recorder {
    requests: Vec<RecordedRequest>,
    rules: Vec<Rule>,
}

/// An HTTP server on an ephemeral port that records every request and
/// answers from a list of rules. The first rule whose needle occurs in the
/// request path or body wins; unmatched requests get `200` with an empty
/// body.
pub struct FakeUpstream {
    addr: SocketAddr,
    state: Arc<Mutex<Recorder>>,
    handle: JoinHandle<()>,
}

impl FakeUpstream {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(Mutex::new(Recorder::default()));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let app = Router::new().fallback(handle).with_state(state.clone());
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                eprintln!("fake upstream stopped: {err}");
            }
        });

        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn respond(&self, needle: &str, status: u16, body: impl Into<String>) -> &Self {
        self.lock().rules.push(Rule {
            needle: needle.to_string(),
            status,
            body: body.into(),
        });
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Requests whose path starts with `prefix`.
    pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.starts_with(prefix))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorder> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for FakeUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle(
    State(state): State<Arc<Mutex<Recorder>>>,
    method: Method,
    uri: Uri,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let recorded = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: query.map(|Query(pairs)| pairs).unwrap_or_default(),
        body: String::from_utf8_lossy(&body).into_owned(),
        authorization: header("authorization"),
        content_type: header("content-type"),
    };

    let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let rule = state
        .rules
        .iter()
        .find(|rule| recorded.path.contains(&rule.needle) || recorded.body.contains(&rule.needle))
        .cloned();
    state.requests.push(recorded);
    drop(state);

    match rule {
        Some(rule) => (
            StatusCode::from_u16(rule.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            rule.body,
        )
            .into_response(),
        None => (StatusCode::OK, String::new()).into_response(),
    }
}
