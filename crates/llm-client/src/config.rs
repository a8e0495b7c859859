//! Configuration for an [`crate::facade::LlmClient`] call.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Selects whether/how a model's reasoning trace is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingMode {
    /// No reasoning trace requested.
    Off,
    /// Reasoning trace interleaved with output as `reasoning_delta` events.
    Interleaved,
}

/// Per-call knobs: model, websearch, and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    pub model: String,
    pub enable_websearch: bool,
    pub websearch_limit: usize,
    pub thinking_mode: ThinkingMode,
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

impl CallConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            enable_websearch: false,
            websearch_limit: 5,
            thinking_mode: ThinkingMode::Off,
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }

    pub fn with_websearch(mut self, enabled: bool, limit: usize) -> Self {
        self.enable_websearch = enabled;
        self.websearch_limit = limit;
        self
    }

    pub fn with_thinking_mode(mut self, mode: ThinkingMode) -> Self {
        self.thinking_mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}
