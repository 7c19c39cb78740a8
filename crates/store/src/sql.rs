use tracelens_core::error::{Result, TracelensError};

/// SQL text plus the typed parameters ClickHouse binds into its
/// `{name:Type}` placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<(String, String)>,
}

impl BuiltQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, name: &str, value: impl ToString) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Renders `value` as a single-quoted string literal.
///
/// Used only where the store has no binding for the construct (IN-lists).
/// Quotes are doubled, backslashes escaped, and control characters refused.
pub fn quote_literal(value: &str) -> Result<String> {
    if value.chars().any(char::is_control) {
        return Err(TracelensError::InvalidArgument(format!(
            "filter value contains control characters: {value:?}"
        )));
    }

    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('\'');
    Ok(out)
}

pub fn quoted_list(values: &[String]) -> Result<String> {
    let quoted = values
        .iter()
        .map(|v| quote_literal(v))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

/// `ILIKE` pattern matching `needle` as a literal substring.
pub fn contains_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}
