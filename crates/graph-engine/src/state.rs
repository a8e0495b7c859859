//! State representation and merge semantics.
//!
//! Graph state is a JSON object. Most fields are last-writer-wins; a field
//! registered as an *accumulator* instead merges by concatenating arrays, so
//! that parallel fan-out branches that each append to the same logical list
//! (e.g. `agent_results`) commute regardless of completion order.

use serde_json::{Map, Value};
use std::collections::HashSet;

/// A node's return value: a set of field writes to merge into graph state.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    writes: Vec<(String, Value)>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write to `field`. Whether it appends or replaces is decided by
    /// the accumulator set passed to [`merge_patch`] at merge time.
    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.writes.push((field.into(), value));
        self
    }

    pub fn writes(&self) -> &[(String, Value)] {
        &self.writes
    }
}

/// Merge `patch` into `state`, treating every field in `accumulators` as a
/// list that gets appended to (creating it if absent) and every other field
/// as last-writer-wins.
pub fn merge_patch(state: &mut Map<String, Value>, patch: StatePatch, accumulators: &HashSet<&str>) {
    for (field, value) in patch.writes {
        if accumulators.contains(field.as_str()) {
            let entry = state.entry(field).or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(arr) = entry {
                arr.push(value);
            } else {
                *entry = Value::Array(vec![value]);
            }
        } else {
            state.insert(field, value);
        }
    }
}

/// Merge several patches produced by parallel fan-out branches, in the order
/// the branches were dispatched — append order is therefore dispatch order,
/// not completion order, keeping the merge deterministic even though the
/// branches themselves ran concurrently.
pub fn merge_patches(
    state: &mut Map<String, Value>,
    patches: Vec<StatePatch>,
    accumulators: &HashSet<&str>,
) {
    for patch in patches {
        merge_patch(state, patch, accumulators);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accumulator_fields_append() {
        let mut state = Map::new();
        let accum: HashSet<&str> = ["agent_results"].into_iter().collect();
        merge_patch(&mut state, StatePatch::new().set("agent_results", json!({"a": 1})), &accum);
        merge_patch(&mut state, StatePatch::new().set("agent_results", json!({"a": 2})), &accum);
        assert_eq!(state["agent_results"], json!([{"a": 1}, {"a": 2}]));
    }

    #[test]
    fn scalar_fields_replace() {
        let mut state = Map::new();
        let accum: HashSet<&str> = HashSet::new();
        merge_patch(&mut state, StatePatch::new().set("phase", json!("init")), &accum);
        merge_patch(&mut state, StatePatch::new().set("phase", json!("gather")), &accum);
        assert_eq!(state["phase"], json!("gather"));
    }

    #[test]
    fn fan_out_merge_is_order_independent_of_completion() {
        let accum: HashSet<&str> = ["agent_results"].into_iter().collect();
        let dispatch_order = vec![
            StatePatch::new().set("agent_results", json!("a")),
            StatePatch::new().set("agent_results", json!("b")),
        ];
        let mut state = Map::new();
        merge_patches(&mut state, dispatch_order, &accum);
        assert_eq!(state["agent_results"], json!(["a", "b"]));
    }
}
