use serde::{Deserialize, Serialize};

/// Column the trace list is ordered by. Unknown input falls back to duration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Duration,
    Start,
    SpanCount,
}

impl SortField {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "spancount" | "span_count" => Self::SpanCount,
            _ => Self::Duration,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::Duration => "DurationMs",
            Self::Start => "StartTs",
            Self::SpanCount => "SpanCount",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Only the exact keyword `ASC` sorts ascending; everything else is descending.
    pub fn parse(s: &str) -> Self {
        if s == "ASC" {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Labeling policy for flame graph nodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum GroupBy {
    Service,
    Operation,
    #[default]
    ServiceOperation,
}

impl GroupBy {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "service" => Self::Service,
            "operation" | "name" => Self::Operation,
            _ => Self::ServiceOperation,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum FlameMode {
    #[default]
    Total,
    SelfTime,
}

impl FlameMode {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "self" => Self::SelfTime,
            _ => Self::Total,
        }
    }
}
