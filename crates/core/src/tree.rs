use std::collections::{HashMap, HashSet};

use crate::error::TracelensError;
use crate::model::span::Span;

/// Spans of one trace keyed by span id.
pub type SpanMap = HashMap<String, Span>;

/// Indexes spans by id. A duplicated id keeps the last span seen.
pub fn index_by_id(spans: impl IntoIterator<Item = Span>) -> SpanMap {
    let mut map = SpanMap::new();
    for span in spans {
        map.insert(span.span_id.clone(), span);
    }
    map
}

/// Parent/child adjacency over the spans of one trace.
///
/// Roots are spans without a parent or whose parent is not part of the
/// trace; they are ordered by id. Children are ordered by start time, ties
/// broken by id, so identical input always yields identical output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanTree {
    pub roots: Vec<String>,
    pub children: HashMap<String, Vec<String>>,
    /// Spans unreachable from any root, i.e. caught in a parent cycle.
    pub detached: Vec<String>,
}

impl SpanTree {
    pub fn build(spans: &SpanMap) -> Self {
        let mut roots = Vec::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();

        for span in spans.values() {
            if !span.has_parent() || !spans.contains_key(&span.parent_span_id) {
                roots.push(span.span_id.clone());
            } else {
                children
                    .entry(span.parent_span_id.clone())
                    .or_default()
                    .push(span.span_id.clone());
            }
        }

        roots.sort();
        let start_of = |id: &str| spans.get(id).map_or(i64::MAX, |s| s.start_unix_nanos);
        for ids in children.values_mut() {
            ids.sort_by(|a, b| start_of(a).cmp(&start_of(b)).then_with(|| a.cmp(b)));
        }

        let detached = unreachable_ids(spans, &roots, &children);
        if !detached.is_empty() {
            let cut: HashSet<&String> = detached.iter().collect();
            children.retain(|parent, _| !cut.contains(parent));
        }

        let tree = Self {
            roots,
            children,
            detached,
        };
        if let Some(err) = tree.cycle_error() {
            tracing::warn!(error = %err, "dropping spans caught in a parent cycle");
        }
        tree
    }

    /// The detached spans as a decode failure, if there are any.
    pub fn cycle_error(&self) -> Option<TracelensError> {
        let first = self.detached.first()?;
        Some(TracelensError::Decode(format!(
            "{} spans unreachable from any root (first {first})",
            self.detached.len()
        )))
    }

    pub fn children_of(&self, id: &str) -> &[String] {
        self.children.get(id).map_or(&[][..], Vec::as_slice)
    }
}

fn unreachable_ids(
    spans: &SpanMap,
    roots: &[String],
    children: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    let mut reached: HashSet<&str> = HashSet::with_capacity(spans.len());
    let mut stack: Vec<&str> = roots.iter().map(String::as_str).collect();
    while let Some(id) = stack.pop() {
        if !reached.insert(id) {
            continue;
        }
        if let Some(next) = children.get(id) {
            stack.extend(next.iter().map(String::as_str));
        }
    }

    let mut out = spans
        .keys()
        .filter(|id| !reached.contains(id.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(id: &str, parent: &str, start: i64, end: i64) -> Span {
        Span {
            span_id: id.into(),
            parent_span_id: parent.into(),
            name: id.into(),
            service: "svc".into(),
            start_unix_nanos: start,
            end_unix_nanos: end,
            ..Span::default()
        }
    }

    #[test]
    fn orphans_are_promoted_to_roots() {
        let spans = index_by_id([
            span("a", "", 0, 10),
            span("b", "missing", 1, 5),
            span("c", "a", 2, 3),
        ]);
        let tree = SpanTree::build(&spans);
        assert_eq!(tree.roots, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(tree.children_of("a"), ["c".to_string()]);
        assert!(tree.detached.is_empty());
        assert!(tree.cycle_error().is_none());
    }

    #[test]
    fn children_ordered_by_start_then_id() {
        let spans = index_by_id([
            span("root", "", 0, 100),
            span("late", "root", 50, 60),
            span("z-early", "root", 10, 20),
            span("a-early", "root", 10, 20),
        ]);
        let tree = SpanTree::build(&spans);
        assert_eq!(
            tree.children_of("root"),
            ["a-early".to_string(), "z-early".to_string(), "late".to_string()]
        );
    }

    #[test]
    fn roots_ordered_by_id() {
        let spans = index_by_id([
            span("r3", "", 0, 1),
            span("r1", "", 5, 6),
            span("r2", "", 2, 3),
        ]);
        let tree = SpanTree::build(&spans);
        assert_eq!(tree.roots, vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn cycles_are_detached() {
        let spans = index_by_id([
            span("root", "", 0, 100),
            span("x", "y", 1, 2),
            span("y", "x", 3, 4),
            span("self", "self", 5, 6),
            span("under", "x", 7, 8),
        ]);
        let tree = SpanTree::build(&spans);
        assert_eq!(tree.roots, vec!["root"]);
        assert_eq!(tree.detached, vec!["self", "under", "x", "y"]);
        assert!(tree.children_of("x").is_empty());
        assert!(tree.children_of("y").is_empty());
        let err = tree.cycle_error().unwrap();
        assert!(matches!(err, TracelensError::Decode(_)));
        assert!(err.to_string().contains("4 spans"));
    }

    #[test]
    fn duplicate_ids_keep_last() {
        let spans = index_by_id([span("a", "", 0, 10), span("a", "", 0, 99)]);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans["a"].end_unix_nanos, 99);
    }

    #[test]
    fn empty_input_has_no_roots() {
        let tree = SpanTree::build(&SpanMap::new());
        assert!(tree.roots.is_empty());
        assert!(tree.children.is_empty());
    }
}
