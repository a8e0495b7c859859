//! The streaming LLM call facade.
//!
//! A single primitive — [`LlmClient::call`] — given messages and a
//! [`CallConfig`], yields a lazy finite sequence of typed [`LlmEvent`]s
//! terminated by either [`LlmEvent::ResponseComplete`] or [`LlmEvent::Error`].
//! Consumers accumulate `output_delta`/`reasoning_delta` themselves (the
//! agent runner) or call [`collect`] when only the aggregate is needed (the
//! debate runner, which bypasses chunk emission to avoid duplicating content
//! into two channels).

use crate::error::{LlmError, Result};
use crate::sources::{extract_urls, NormalizedSource, SourceCollector};
use crate::CallConfig;
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// One typed event from an in-flight call.
#[derive(Debug, Clone)]
pub enum LlmEvent {
    ResponseStart,
    ReasoningDelta { delta: String },
    OutputDelta { delta: String },
    SearchStart { query: String },
    SearchProgress { note: String },
    SearchComplete { sources: Vec<NormalizedSource> },
    ResponseComplete(CallOutcome),
    Error { message: String, correlation_id: Option<String> },
}

/// The aggregate result of a completed call.
#[derive(Debug, Clone, Default)]
pub struct CallOutcome {
    pub output: String,
    pub thinking: Option<String>,
    pub sources: Vec<NormalizedSource>,
}

pub type LlmEventStream = Pin<Box<dyn Stream<Item = LlmEvent> + Send>>;

/// The upstream LLM call primitive. `model` and `enable_websearch` are
/// threaded through failures so a raised error can carry enough context for
/// the tool registry to log a meaningful `tool_error` event.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn call(&self, messages: &[Message], config: &CallConfig) -> Result<LlmEventStream>;
}

/// Drive a stream to completion, discarding chunk events, returning only the
/// terminal aggregate (or the terminal error).
pub async fn collect(mut stream: LlmEventStream) -> Result<CallOutcome> {
    while let Some(event) = stream.next().await {
        match event {
            LlmEvent::ResponseComplete(outcome) => return Ok(outcome),
            LlmEvent::Error { message, correlation_id } => {
                return Err(LlmError::Upstream { message, correlation_id })
            }
            _ => {}
        }
    }
    Err(LlmError::Connection("stream ended without a terminal event".into()))
}

/// Parse an arbitrary, provider-specific search-result JSON value for
/// URL-bearing fields, normalizing each candidate and deduping in first-seen
/// order — the facade's documented source-extraction contract.
pub fn sources_from_search_result(value: &Value) -> Vec<NormalizedSource> {
    let mut collector = SourceCollector::new();
    for raw in extract_urls(value) {
        collector.add(&raw);
    }
    collector.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn collect_returns_terminal_outcome_and_skips_chunks() {
        let events = vec![
            LlmEvent::ResponseStart,
            LlmEvent::OutputDelta { delta: "hello".into() },
            LlmEvent::ResponseComplete(CallOutcome {
                output: "hello world".into(),
                thinking: None,
                sources: vec![],
            }),
        ];
        let stream: LlmEventStream = Box::pin(tokio_stream::iter(events));
        let outcome = collect(stream).await.unwrap();
        assert_eq!(outcome.output, "hello world");
    }

    #[tokio::test]
    async fn collect_propagates_terminal_error() {
        let events = vec![LlmEvent::Error {
            message: "rate limited".into(),
            correlation_id: Some("abc-123".into()),
        }];
        let stream: LlmEventStream = Box::pin(tokio_stream::iter(events));
        let err = collect(stream).await.unwrap_err();
        assert!(matches!(err, LlmError::Upstream { .. }));
    }

    #[test]
    fn sources_from_search_result_normalizes_and_dedups() {
        let value = json!({
            "results": [
                {"url": "www.example.com/a"},
                {"url_citation": {"url": "https://www.example.com/a."}},
            ]
        });
        let sources = sources_from_search_result(&value);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].as_str(), "https://www.example.com/a");
    }
}
