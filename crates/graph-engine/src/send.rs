//! Dynamic fan-out: the [`Send`] primitive and conditional-edge routing.
//!
//! A conditional edge's router returns a [`ConditionalEdgeResult`]. Returning
//! `Nodes` dispatches every listed node in parallel against a copy of the
//! current state; each branch runs to completion and its [`crate::state::StatePatch`]
//! is merged back at the barrier. This is the primitive the orchestrator uses
//! to fan the four worker agents out in parallel from a single `gather` edge.

use crate::graph::NodeId;

/// Target a specific node, carrying a distinguishing label for events/logs.
#[derive(Debug, Clone)]
pub struct Send {
    node: NodeId,
    label: String,
}

impl Send {
    pub fn new(node: impl Into<NodeId>, label: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            label: label.into(),
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Return type for conditional edge routers.
#[derive(Debug, Clone)]
pub enum ConditionalEdgeResult {
    /// Route to a single node.
    Node(NodeId),
    /// Fan out to every listed node in parallel, same input state.
    Nodes(Vec<NodeId>),
    /// Fan out via explicit [`Send`] directives (same state, distinct labels).
    Sends(Vec<Send>),
}

impl From<&str> for ConditionalEdgeResult {
    fn from(node: &str) -> Self {
        ConditionalEdgeResult::Node(node.to_string())
    }
}

impl From<String> for ConditionalEdgeResult {
    fn from(node: String) -> Self {
        ConditionalEdgeResult::Node(node)
    }
}

impl From<Vec<Send>> for ConditionalEdgeResult {
    fn from(sends: Vec<Send>) -> Self {
        ConditionalEdgeResult::Sends(sends)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_carries_node_and_label() {
        let s = Send::new("trend_scout", "worker:0");
        assert_eq!(s.node(), "trend_scout");
        assert_eq!(s.label(), "worker:0");
    }

    #[test]
    fn conditional_edge_result_from_str() {
        let r: ConditionalEdgeResult = "synthesizer".into();
        matches!(r, ConditionalEdgeResult::Node(n) if n == "synthesizer");
    }
}
