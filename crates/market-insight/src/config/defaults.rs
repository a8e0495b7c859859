//! Named policy constants. Kept out of literal scatter so tests can override
//! them via `WorkflowConfig`/`EngineConfig` instead of hard-coding behavior.

use std::time::Duration;

pub const DEBATE_ROUNDS: u8 = 1;
pub const ENABLE_FOLLOWUP: bool = true;
pub const ENABLE_WEBSEARCH: bool = true;

pub const RETRY_MAX_ATTEMPTS: usize = 2;
pub const RETRY_BACKOFF_MS: u64 = 500;

/// Per-worker startup stagger: `worker_index * STAGGER_MS`.
pub const STAGGER_MS: u64 = 120;

/// Adaptive throttle: default and reduced concurrency width.
pub const THROTTLE_DEFAULT_WIDTH: usize = 4;
pub const THROTTLE_REDUCED_WIDTH: usize = 2;
pub const THROTTLE_FAILURE_THRESHOLD: u32 = 4;
pub const THROTTLE_RECOVERY_STREAK: u32 = 6;
pub const THROTTLE_COOLDOWN: Duration = Duration::from_secs(120);
pub const THROTTLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub const GUARDRAIL_MAX_ESTIMATED_COST_USD: f64 = 1.0;
pub const GUARDRAIL_MAX_ERROR_RATE: f64 = 0.5;
pub const GUARDRAIL_MIN_CALLS_FOR_ERROR_RATE: usize = 3;
pub const GUARDRAIL_ACTION: &str = "disable_websearch";

pub const DEFAULT_INPUT_PRICE_USD_PER_1K: f64 = 0.0005;
pub const DEFAULT_OUTPUT_PRICE_USD_PER_1K: f64 = 0.0020;

pub const LLM_TIMEOUT: Duration = Duration::from_secs(60);
pub const LLM_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub const EVENT_SINK_QUEUE_CAPACITY: usize = 2000;
pub const EVENT_SINK_SHUTDOWN_JOIN: Duration = Duration::from_secs(3);
pub const EVENT_SINK_WRITE_FAILURE_BACKOFF: Duration = Duration::from_millis(50);

pub const STABILITY_HIGH_THRESHOLD: f64 = 85.0;
pub const STABILITY_MEDIUM_THRESHOLD: f64 = 65.0;
