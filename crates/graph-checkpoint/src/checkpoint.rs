//! Checkpoint data structures.

use serde::{Deserialize, Serialize};

/// One persisted snapshot of graph-internal state, taken after a node
/// transition. `step` is the node's position in execution order (0-based);
/// `node_id` names the node whose completion produced this snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub step: usize,
    pub node_id: String,
    pub value: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl CheckpointEntry {
    pub fn new(step: usize, node_id: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            step,
            node_id: node_id.into(),
            value,
            created_at: chrono::Utc::now(),
        }
    }
}
