//! Typed state graph engine: node registry, fan-out dispatch, conditional
//! routing, retry policy, and checkpoint integration.

pub mod error;
pub mod graph;
pub mod retry;
pub mod send;
pub mod state;

pub use error::{GraphError, Result};
pub use graph::{CompiledGraph, NodeId, StateGraph, END};
pub use retry::{DegradeMode, RetryPolicy};
pub use send::{ConditionalEdgeResult, Send};
pub use state::{merge_patch, merge_patches, StatePatch};
