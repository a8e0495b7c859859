//! The typed state graph: node registry, fan-out dispatch, conditional
//! routing, and (optional) checkpointing after every node transition.

use crate::error::{GraphError, Result};
use crate::send::ConditionalEdgeResult;
use crate::state::{merge_patches, StatePatch};
use futures::future::BoxFuture;
use graph_checkpoint::{CheckpointEntry, CheckpointSaver};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub type NodeId = String;

/// Sentinel node id marking graph termination.
pub const END: &str = "__end__";

pub type NodeFn = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<StatePatch>> + Send + Sync>;
pub type RouterFn = Arc<dyn Fn(&Value) -> ConditionalEdgeResult + Send + Sync>;

/// A node builder, before `compile()`.
#[derive(Clone)]
pub struct StateGraph {
    nodes: HashMap<NodeId, NodeFn>,
    edges: HashMap<NodeId, NodeId>,
    conditional_edges: HashMap<NodeId, RouterFn>,
    entry_point: Option<NodeId>,
    accumulators: HashSet<String>,
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl StateGraph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            conditional_edges: HashMap::new(),
            entry_point: None,
            accumulators: HashSet::new(),
        }
    }

    /// Register `field` as accumulating (list-append) rather than
    /// last-writer-wins under the barrier merge rule.
    pub fn with_accumulator(mut self, field: impl Into<String>) -> Self {
        self.accumulators.insert(field.into());
        self
    }

    pub fn add_node<F, Fut>(mut self, id: impl Into<NodeId>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<StatePatch>> + Send + 'static,
    {
        self.nodes.insert(id.into(), Arc::new(move |v| Box::pin(f(v))));
        self
    }

    pub fn set_entry_point(mut self, id: impl Into<NodeId>) -> Self {
        self.entry_point = Some(id.into());
        self
    }

    pub fn add_edge(mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        self.edges.insert(from.into(), to.into());
        self
    }

    pub fn add_conditional_edge<F>(mut self, from: impl Into<NodeId>, router: F) -> Self
    where
        F: Fn(&Value) -> ConditionalEdgeResult + Send + Sync + 'static,
    {
        self.conditional_edges.insert(from.into(), Arc::new(router));
        self
    }

    pub fn compile(self) -> Result<CompiledGraph> {
        let entry_point = self
            .entry_point
            .clone()
            .ok_or_else(|| GraphError::Validation("no entry point set".into()))?;
        if !self.nodes.contains_key(&entry_point) {
            return Err(GraphError::NodeNotFound(entry_point));
        }
        Ok(CompiledGraph {
            graph: self,
            checkpoint_saver: None,
        })
    }
}

/// A compiled, executable graph.
pub struct CompiledGraph {
    graph: StateGraph,
    checkpoint_saver: Option<Arc<dyn CheckpointSaver>>,
}

impl CompiledGraph {
    pub fn with_checkpointer(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.checkpoint_saver = Some(saver);
        self
    }

    /// Run the graph to completion from `initial`, checkpointing after every
    /// node transition under `thread_id` if a checkpointer is attached.
    pub async fn invoke(&self, initial: Value, thread_id: &str) -> Result<Value> {
        let mut state: Map<String, Value> = match initial {
            Value::Object(m) => m,
            Value::Null => Map::new(),
            other => {
                return Err(GraphError::Validation(format!(
                    "initial state must be an object, got {other}"
                )))
            }
        };

        let mut current = self
            .graph
            .entry_point
            .clone()
            .ok_or_else(|| GraphError::Validation("no entry point set".into()))?;
        let mut step = 0usize;

        loop {
            if current == END {
                break;
            }

            let node = self
                .graph
                .nodes
                .get(&current)
                .ok_or_else(|| GraphError::NodeNotFound(current.clone()))?
                .clone();

            let patch = node(Value::Object(state.clone())).await?;
            merge_patches(&mut state, vec![patch], &self.accumulator_refs());
            self.checkpoint(thread_id, step, &current, &state).await?;
            step += 1;

            current = self.route_after(&current, &state).await?;
        }

        Ok(Value::Object(state))
    }

    /// Resolve what runs after `node_id` completes: a conditional router if
    /// registered (which may fan out to several nodes in parallel before the
    /// next step is chosen), otherwise the plain edge.
    async fn route_after(&self, node_id: &str, state: &Map<String, Value>) -> Result<NodeId> {
        if let Some(router) = self.graph.conditional_edges.get(node_id) {
            let result = router(&Value::Object(state.clone()));
            match result {
                ConditionalEdgeResult::Node(n) => Ok(n),
                ConditionalEdgeResult::Nodes(ns) | ConditionalEdgeResult::Sends(_) => {
                    Err(GraphError::Validation(format!(
                        "node {node_id} returned {} parallel targets; use fan_out() for parallel dispatch",
                        match &result {
                            ConditionalEdgeResult::Nodes(n) => n.len(),
                            _ => ns_len(&ns),
                        }
                    )))
                }
            }
        } else if let Some(next) = self.graph.edges.get(node_id) {
            Ok(next.clone())
        } else {
            Ok(END.to_string())
        }
    }

    fn accumulator_refs(&self) -> HashSet<&str> {
        self.graph.accumulators.iter().map(|s| s.as_str()).collect()
    }

    async fn checkpoint(
        &self,
        thread_id: &str,
        step: usize,
        node_id: &str,
        state: &Map<String, Value>,
    ) -> Result<()> {
        if let Some(saver) = &self.checkpoint_saver {
            saver
                .put(
                    thread_id,
                    CheckpointEntry::new(step, node_id, Value::Object(state.clone())),
                )
                .await
                .map_err(|e| GraphError::Checkpoint(e.to_string()))?;
        }
        Ok(())
    }

    /// Run `node_ids` concurrently against a shared snapshot of `state`,
    /// merging their patches back in dispatch order once all complete. This
    /// is the fan-out/barrier primitive: callers invoke it directly (rather
    /// than through a conditional edge) when they need the merged state back
    /// to decide the next step, matching the orchestrator's gather barrier.
    pub async fn fan_out(
        &self,
        node_ids: &[NodeId],
        state: &Map<String, Value>,
    ) -> Result<Vec<(NodeId, Result<StatePatch>)>> {
        let mut set = tokio::task::JoinSet::new();
        for (idx, id) in node_ids.iter().enumerate() {
            let node = self
                .graph
                .nodes
                .get(id)
                .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?
                .clone();
            let input = Value::Object(state.clone());
            let id = id.clone();
            set.spawn(async move {
                let result = node(input).await;
                (idx, id, result)
            });
        }

        let mut results: Vec<Option<(NodeId, Result<StatePatch>)>> =
            (0..node_ids.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            let (idx, id, result) = joined
                .map_err(|e| GraphError::Execution(format!("fan-out task panicked: {e}")))?;
            results[idx] = Some((id, result));
        }
        Ok(results.into_iter().flatten().collect())
    }

    pub fn accumulators(&self) -> HashSet<&str> {
        self.accumulator_refs()
    }
}

fn ns_len(sends: &[crate::send::Send]) -> usize {
    sends.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StatePatch;
    use serde_json::json;

    #[tokio::test]
    async fn simple_linear_graph_runs_to_end() {
        let graph = StateGraph::new()
            .add_node("start", |_state| async move {
                Ok(StatePatch::new().set("count", json!(1)))
            })
            .add_node("finish", |state| async move {
                let count = state["count"].as_i64().unwrap_or(0);
                Ok(StatePatch::new().set("count", json!(count + 1)))
            })
            .set_entry_point("start")
            .add_edge("start", "finish")
            .add_edge("finish", END)
            .compile()
            .unwrap();

        let result = graph.invoke(json!({}), "thread-1").await.unwrap();
        assert_eq!(result["count"], json!(2));
    }

    #[tokio::test]
    async fn fan_out_merges_patches_in_dispatch_order() {
        let graph = StateGraph::new()
            .with_accumulator("agent_results")
            .add_node("a", |_s| async move { Ok(StatePatch::new().set("agent_results", json!("a"))) })
            .add_node("b", |_s| async move { Ok(StatePatch::new().set("agent_results", json!("b"))) })
            .set_entry_point("a")
            .add_edge("a", END)
            .compile()
            .unwrap();

        let mut state = Map::new();
        let results = graph
            .fan_out(&["a".to_string(), "b".to_string()], &state)
            .await
            .unwrap();
        let patches: Vec<StatePatch> = results.into_iter().map(|(_, r)| r.unwrap()).collect();
        merge_patches(&mut state, patches, &graph.accumulators());
        assert_eq!(state["agent_results"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn missing_entry_point_fails_compile() {
        let err = StateGraph::new()
            .add_node("a", |_s| async move { Ok(StatePatch::new()) })
            .compile();
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn checkpointer_records_every_transition() {
        use graph_checkpoint::InMemoryCheckpointSaver;

        let saver = Arc::new(InMemoryCheckpointSaver::new());
        let graph = StateGraph::new()
            .add_node("a", |_s| async move { Ok(StatePatch::new().set("x", json!(1))) })
            .add_node("b", |_s| async move { Ok(StatePatch::new().set("x", json!(2))) })
            .set_entry_point("a")
            .add_edge("a", "b")
            .add_edge("b", END)
            .compile()
            .unwrap()
            .with_checkpointer(saver.clone());

        graph.invoke(json!({}), "thread-x").await.unwrap();
        assert_eq!(saver.list("thread-x").await.unwrap().len(), 2);
    }
}
