//! Exponential backoff retry policy with a stable, per-target jitter.
//!
//! Unlike a classic random-jitter policy, the jitter here is a deterministic
//! function of `(target_id, attempt)` so that retry timing is reproducible in
//! tests: `delay = base_ms * 2^(attempt-1) * (1 + 0.01 * (hash(target) mod 41))`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// What a node should do once its retry attempts are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeMode {
    /// Re-raise; the caller aborts the session.
    Fail,
    /// Drop the result entirely; downstream must tolerate the gap.
    Skip,
    /// Synthesize an empty/errored result and continue.
    Partial,
}

/// Configuration for retrying a single node or exchange.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_ms: u64,
    pub degrade_mode: DegradeMode,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_ms: u64, degrade_mode: DegradeMode) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_ms,
            degrade_mode,
        }
    }

    /// Delay before the attempt numbered `attempt` (1-based), given the
    /// previous attempt failed. `target_id` seeds the stable jitter.
    pub fn backoff_delay(&self, target_id: &str, attempt: usize) -> Duration {
        let exp = attempt.saturating_sub(1) as u32;
        let base = self.base_ms as f64 * 2f64.powi(exp as i32);
        let jitter_bucket = (stable_hash(target_id, attempt) % 41) as f64;
        let factor = 1.0 + 0.01 * jitter_bucket;
        Duration::from_millis((base * factor).round() as u64)
    }

    /// True if another attempt is allowed after `attempt` failures so far.
    pub fn should_retry(&self, attempts_so_far: usize) -> bool {
        attempts_so_far < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, 500, DegradeMode::Partial)
    }
}

/// Deterministic hash of `"{target_id}:{attempt}"`, used for stable jitter.
pub fn stable_hash(target_id: &str, attempt: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    target_id.hash(&mut hasher);
    b":".hash(&mut hasher);
    attempt.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_monotonic_in_attempt() {
        let policy = RetryPolicy::new(5, 100, DegradeMode::Partial);
        let d1 = policy.backoff_delay("trend_scout", 1);
        let d2 = policy.backoff_delay("trend_scout", 2);
        let d3 = policy.backoff_delay("trend_scout", 3);
        assert!(d2 >= d1);
        assert!(d3 >= d2);
    }

    #[test]
    fn backoff_matches_the_documented_law() {
        let policy = RetryPolicy::new(3, 100, DegradeMode::Partial);
        for attempt in 1..=3 {
            let expected_bucket = stable_hash("foo", attempt) % 41;
            let expected =
                100f64 * 2f64.powi((attempt - 1) as i32) * (1.0 + 0.01 * expected_bucket as f64);
            let got = policy.backoff_delay("foo", attempt);
            assert_eq!(got.as_millis() as u64, expected.round() as u64);
        }
    }

    #[test]
    fn should_retry_respects_max_attempts() {
        let policy = RetryPolicy::new(2, 0, DegradeMode::Fail);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
    }
}
