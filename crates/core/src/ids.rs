use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TracelensError};

const MAX_TRACE_ID_LEN: usize = 128;

/// A trace identifier taken from a request path, normalized to lowercase.
///
/// Ids are opaque to the service; only length and control characters are
/// checked so that hostile input never reaches a query verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(String);

impl TraceId {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TracelensError::InvalidArgument(
                "trace id is required".to_string(),
            ));
        }
        if trimmed.len() > MAX_TRACE_ID_LEN {
            return Err(TracelensError::InvalidArgument(format!(
                "trace id longer than {MAX_TRACE_ID_LEN} characters"
            )));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(TracelensError::InvalidArgument(
                "trace id contains control characters".to_string(),
            ));
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
