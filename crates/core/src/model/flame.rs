use serde::{Deserialize, Serialize};

/// One node of a flame graph. Serialized in the d3-flame-graph shape, where
/// the label travels as `name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlameNode {
    #[serde(rename = "name", alias = "label")]
    pub label: String,
    /// Microseconds under the selected mode.
    pub value: u64,
    #[serde(default)]
    pub children: Vec<FlameNode>,
}

impl FlameNode {
    pub fn leaf(label: impl Into<String>, value: u64) -> Self {
        Self {
            label: label.into(),
            value,
            children: Vec::new(),
        }
    }

    /// Label of the synthetic node wrapping a whole trace.
    pub fn trace_label(trace_id: &str) -> String {
        format!("trace:{trace_id}")
    }

    pub fn empty_trace(trace_id: &str) -> Self {
        Self::leaf(Self::trace_label(trace_id), 0)
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(FlameNode::node_count).sum::<usize>()
    }
}
