use bytes::{Buf, BytesMut};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracelens_core::config::Config;
use tracelens_core::error::{Result, TracelensError, UPSTREAM_BODY_LIMIT};

use crate::sql::BuiltQuery;

pub(crate) const UPSTREAM: &str = "trace store";

/// HTTP client for the ClickHouse trace store.
#[derive(Debug, Clone)]
pub struct Store {
    http: Client,
    base_url: Url,
    database: String,
    user: String,
    password: Option<String>,
}

/// Rows decoded from a JSONEachRow response. Lines that failed to decode are
/// counted in `dropped` rather than failing the whole query.
#[derive(Debug)]
pub struct Rows<T> {
    pub rows: Vec<T>,
    pub dropped: usize,
}

impl Store {
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.ch_url)
            .map_err(|e| TracelensError::Config(format!("invalid ch_url {}: {e}", config.ch_url)))?;
        let http = Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|e| TracelensError::Internal(format!("build trace store client: {e}")))?;
        Ok(Self {
            http,
            base_url,
            database: config.ch_database.clone(),
            user: config.ch_user.clone(),
            password: config.ch_password.clone(),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Sends `query` and decodes each non-empty response line as a `T`.
    pub async fn query_rows<T: DeserializeOwned>(&self, query: &BuiltQuery) -> Result<Rows<T>> {
        let mut request = self
            .http
            .post(self.base_url.clone())
            .query(&[
                ("database", self.database.as_str()),
                ("default_format", "JSONEachRow"),
                ("output_format_json_quote_64bit_integers", "0"),
            ])
            .body(query.sql.clone());
        let bound = query
            .params
            .iter()
            .map(|(name, value)| (format!("param_{name}"), value.as_str()))
            .collect::<Vec<_>>();
        if !bound.is_empty() {
            request = request.query(&bound);
        }
        if !self.user.is_empty() || self.password.is_some() {
            request = request.basic_auth(&self.user, self.password.as_deref());
        }

        let response = request.send().await.map_err(unreachable)?;
        let mut response = check_status(response).await?;

        let mut buf = BytesMut::new();
        let mut rows = Rows {
            rows: Vec::new(),
            dropped: 0,
        };
        while let Some(chunk) = response.chunk().await.map_err(unreachable)? {
            buf.extend_from_slice(&chunk);
            while let Some(end) = buf.iter().position(|b| *b == b'\n') {
                let line = buf.split_to(end);
                buf.advance(1);
                decode_line(&line, &mut rows);
            }
        }
        if !buf.is_empty() {
            decode_line(&buf, &mut rows);
        }

        if rows.dropped > 0 {
            tracing::warn!(
                dropped = rows.dropped,
                decoded = rows.rows.len(),
                "skipped undecodable trace store rows"
            );
        }
        Ok(rows)
    }

    /// Hits the store's `/ping` endpoint.
    pub async fn ping(&self) -> Result<()> {
        let url = self.ping_url()?;
        let response = self.http.get(url).send().await.map_err(unreachable)?;
        check_status(response).await.map(|_| ())
    }

    /// `ping` appended to the configured URL, keeping any path prefix.
    fn ping_url(&self) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                TracelensError::Config(format!("ch_url {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .push("ping");
        Ok(url)
    }
}

fn decode_line<T: DeserializeOwned>(line: &[u8], rows: &mut Rows<T>) {
    if line.iter().all(u8::is_ascii_whitespace) {
        return;
    }
    match serde_json::from_slice::<T>(line) {
        Ok(row) => rows.rows.push(row),
        Err(err) => {
            tracing::debug!(error = ?err, "malformed trace store row");
            rows.dropped += 1;
        }
    }
}

async fn check_status(mut response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = Vec::new();
    while body.len() < UPSTREAM_BODY_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => body.extend_from_slice(&chunk),
            _ => break,
        }
    }
    Err(TracelensError::upstream_status(
        UPSTREAM,
        status.as_u16(),
        &body,
    ))
}

fn unreachable(err: reqwest::Error) -> TracelensError {
    let message = if err.is_timeout() {
        format!("timed out: {err}")
    } else {
        err.to_string()
    };
    TracelensError::UpstreamUnreachable {
        upstream: UPSTREAM,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct Row {
        id: u32,
    }

    #[test]
    fn decode_line_counts_malformed_rows() {
        let mut rows = Rows::<Row> {
            rows: Vec::new(),
            dropped: 0,
        };
        decode_line(br#"{"id":1}"#, &mut rows);
        decode_line(b"   ", &mut rows);
        decode_line(b"{not json", &mut rows);
        decode_line(br#"{"id":"x"}"#, &mut rows);
        assert_eq!(rows.rows.len(), 1);
        assert_eq!(rows.rows[0].id, 1);
        assert_eq!(rows.dropped, 2);
    }

    #[test]
    fn ping_url_keeps_path_prefix() {
        let ping = |ch_url: &str| {
            let config = Config {
                ch_url: ch_url.to_string(),
                ..Config::default()
            };
            Store::new(&config).unwrap().ping_url().unwrap().to_string()
        };
        assert_eq!(ping("http://ch:8123"), "http://ch:8123/ping");
        assert_eq!(ping("http://proxy/clickhouse"), "http://proxy/clickhouse/ping");
        assert_eq!(ping("http://proxy/clickhouse/"), "http://proxy/clickhouse/ping");
    }

    #[test]
    fn rejects_unparseable_url() {
        let config = Config {
            ch_url: "not a url".into(),
            ..Config::default()
        };
        assert!(matches!(Store::new(&config), Err(TracelensError::Config(_))));
    }
}
