use crate::error::TracelensError;
use crate::filter::{FlameMode, GroupBy};
use crate::model::flame::FlameNode;
use crate::model::span::Span;
use crate::tree::{SpanMap, SpanTree};

pub fn label(span: &Span, group_by: GroupBy) -> String {
    match group_by {
        GroupBy::Service => span.service.clone(),
        GroupBy::Operation => span.name.clone(),
        GroupBy::ServiceOperation => {
            if span.service.is_empty() {
                span.name.clone()
            } else {
                format!("{}:{}", span.service, span.name)
            }
        }
    }
}

/// Builds the flame graph of one trace.
///
/// A single root becomes the top node. Several roots are wrapped in a
/// `trace:<id>` node whose value is the sum of its children. A trace with
/// no usable spans yields an empty `trace:<id>` node.
pub fn flame_graph(trace_id: &str, spans: &SpanMap, group_by: GroupBy, mode: FlameMode) -> FlameNode {
    let tree = SpanTree::build(spans);
    build_from_tree(trace_id, spans, &tree, group_by, mode)
}

/// Deepest level a flame graph keeps. Spans nested further down are cut
/// together with their subtrees.
pub const MAX_FLAME_DEPTH: usize = 256;

pub fn build_from_tree(
    trace_id: &str,
    spans: &SpanMap,
    tree: &SpanTree,
    group_by: GroupBy,
    mode: FlameMode,
) -> FlameNode {
    let mut cut = 0usize;
    let mut roots = tree
        .roots
        .iter()
        .filter_map(|id| build_root(id, spans, tree, group_by, mode, &mut cut))
        .collect::<Vec<_>>();

    if cut > 0 {
        let err = TracelensError::Decode(format!(
            "trace {trace_id} nests deeper than {MAX_FLAME_DEPTH} levels, {cut} subtrees cut"
        ));
        tracing::warn!(error = %err, "truncating flame graph");
    }

    match roots.len() {
        0 => FlameNode::empty_trace(trace_id),
        1 => roots.swap_remove(0),
        _ => FlameNode {
            label: FlameNode::trace_label(trace_id),
            value: roots.iter().map(|c| c.value).sum(),
            children: roots,
        },
    }
}

struct Frame<'a> {
    id: &'a str,
    depth: usize,
    next_child: usize,
    children: Vec<FlameNode>,
}

impl<'a> Frame<'a> {
    fn new(id: &'a str, depth: usize) -> Self {
        Self {
            id,
            depth,
            next_child: 0,
            children: Vec::new(),
        }
    }
}

/// Post-order walk with an explicit stack: a node is finished once all of
/// its children have been.
fn build_root<'a>(
    root: &'a str,
    spans: &SpanMap,
    tree: &'a SpanTree,
    group_by: GroupBy,
    mode: FlameMode,
    cut: &mut usize,
) -> Option<FlameNode> {
    spans.get(root)?;
    let mut stack = vec![Frame::new(root, 1)];

    while let Some(frame) = stack.last_mut() {
        if let Some(child) = tree.children_of(frame.id).get(frame.next_child) {
            frame.next_child += 1;
            if !spans.contains_key(child) {
                continue;
            }
            if frame.depth >= MAX_FLAME_DEPTH {
                *cut += 1;
                continue;
            }
            let depth = frame.depth + 1;
            stack.push(Frame::new(child, depth));
            continue;
        }

        let frame = stack.pop()?;
        let node = finish(frame, spans, tree, group_by, mode)?;
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => return Some(node),
        }
    }
    None
}

fn finish(
    frame: Frame<'_>,
    spans: &SpanMap,
    tree: &SpanTree,
    group_by: GroupBy,
    mode: FlameMode,
) -> Option<FlameNode> {
    let span = spans.get(frame.id)?;
    let total = span.duration_micros();
    let children_total = tree
        .children_of(frame.id)
        .iter()
        .filter_map(|id| spans.get(id))
        .fold(0u64, |acc, child| acc.saturating_add(child.duration_micros()));

    let value = match mode {
        FlameMode::Total => total,
        FlameMode::SelfTime => total.saturating_sub(children_total),
    };

    Some(FlameNode {
        label: label(span, group_by),
        value,
        children: frame.children,
    })
}
