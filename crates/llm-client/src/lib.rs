//! Streaming LLM call facade: typed deltas, source normalization, and a
//! deterministic fake client for tests.

pub mod config;
pub mod error;
pub mod facade;
pub mod fake;
pub mod sources;

pub use config::{CallConfig, ThinkingMode};
pub use error::{LlmError, Result};
pub use facade::{collect, sources_from_search_result, CallOutcome, LlmClient, LlmEvent, LlmEventStream, Message, Role};
pub use fake::{FakeLlmClient, ScriptedReply};
pub use sources::{normalize, extract_urls, NormalizedSource, SourceCollector};
