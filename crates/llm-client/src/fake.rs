//! A deterministic [`LlmClient`] for tests: no network access, scripted
//! output keyed by call order, so integration scenarios are reproducible.

use crate::error::{LlmError, Result};
use crate::facade::{CallOutcome, LlmClient, LlmEvent, LlmEventStream, Message};
use crate::sources::normalize;
use crate::CallConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A single scripted reply: the content to stream back and the raw source
/// URLs surfaced as a `search_complete` event when websearch was requested.
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    pub output: String,
    pub thinking: Option<String>,
    pub raw_sources: Vec<String>,
    pub fail_with: Option<String>,
}

impl ScriptedReply {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            thinking: None,
            raw_sources: Vec::new(),
            fail_with: None,
        }
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.raw_sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_thinking(mut self, thinking: impl Into<String>) -> Self {
        self.thinking = Some(thinking.into());
        self
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            output: String::new(),
            thinking: None,
            raw_sources: Vec::new(),
            fail_with: Some(message.into()),
        }
    }
}

/// Replays a fixed script of replies in call order, cycling once exhausted.
/// Every recorded call is retained for assertions in tests.
#[derive(Debug, Clone)]
pub struct FakeLlmClient {
    script: Vec<ScriptedReply>,
    cursor: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<(Vec<Message>, CallConfig)>>>,
}

impl FakeLlmClient {
    pub fn new(script: Vec<ScriptedReply>) -> Self {
        Self {
            script,
            cursor: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn single(reply: ScriptedReply) -> Self {
        Self::new(vec![reply])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn call(&self, messages: &[Message], config: &CallConfig) -> Result<LlmEventStream> {
        self.calls.lock().push((messages.to_vec(), config.clone()));
        if self.script.is_empty() {
            return Err(LlmError::Connection("fake client has an empty script".into()));
        }
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst) % self.script.len();
        let reply = self.script[idx].clone();

        let mut events = vec![LlmEvent::ResponseStart];
        if let Some(message) = reply.fail_with {
            events.push(LlmEvent::Error { message, correlation_id: None });
            return Ok(Box::pin(tokio_stream::iter(events)));
        }

        if let Some(thinking) = &reply.thinking {
            events.push(LlmEvent::ReasoningDelta { delta: thinking.clone() });
        }
        events.push(LlmEvent::OutputDelta { delta: reply.output.clone() });

        let sources: Vec<_> = reply
            .raw_sources
            .iter()
            .filter_map(|raw| normalize(raw))
            .collect();
        if config.enable_websearch && !sources.is_empty() {
            events.push(LlmEvent::SearchStart { query: "synthetic-query".into() });
            events.push(LlmEvent::SearchComplete { sources: sources.clone() });
        }

        events.push(LlmEvent::ResponseComplete(CallOutcome {
            output: reply.output,
            thinking: reply.thinking,
            sources,
        }));

        Ok(Box::pin(tokio_stream::iter(events)))
    }
}
