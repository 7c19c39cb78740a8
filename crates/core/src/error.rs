use thiserror::Error;

/// Upstream bodies carried in errors are cut to this many bytes.
pub const UPSTREAM_BODY_LIMIT: usize = 4096;

#[derive(Debug, Error)]
pub enum TracelensError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("{upstream} returned {status}: {body}")]
    UpstreamStatus {
        upstream: &'static str,
        status: u16,
        body: String,
    },

    #[error("{upstream} unreachable: {message}")]
    UpstreamUnreachable {
        upstream: &'static str,
        message: String,
    },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TracelensError {
    pub fn upstream_status(upstream: &'static str, status: u16, body: &[u8]) -> Self {
        Self::UpstreamStatus {
            upstream,
            status,
            body: truncate_body(body),
        }
    }

    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamStatus { .. } | Self::UpstreamUnreachable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TracelensError>;

pub fn truncate_body(body: &[u8]) -> String {
    let cut = &body[..body.len().min(UPSTREAM_BODY_LIMIT)];
    String::from_utf8_lossy(cut).into_owned()
}
