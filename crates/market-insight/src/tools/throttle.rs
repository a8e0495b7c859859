//! Process-wide adaptive concurrency throttle over outbound LLM calls.
//!
//! Grounded in the teacher's connection-pool-style "mutex + condvar gate"
//! pattern (see `graph-engine`'s scheduler primitives) and spec §4.4.

use crate::config::{defaults, EngineConfig};
use crate::events::{SessionEvent, ThrottleMode};
use crate::events::sink::SinkHandle;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

const CONNECTION_LIKE_SUBSTRINGS: &[&str] = &["connection error", "timed out", "timeout", "connect", "network", "ssl", "tls"];

pub fn is_connection_like(message: &str) -> bool {
    let lower = message.to_lowercase();
    CONNECTION_LIKE_SUBSTRINGS.iter().any(|needle| lower.contains(needle))
}

struct ThrottleState {
    width: usize,
    in_use: usize,
    consecutive_connection_like_failures: u32,
    consecutive_successes: u32,
    recovery_not_before: Option<Instant>,
}

/// A single process-wide semaphore with a shrink/grow rule layered on top.
/// Acquisition polls with a short timeout so shrinking the width promptly
/// wakes blocked waiters instead of leaving them parked on a stale width.
pub struct AdaptiveThrottle {
    default_width: usize,
    reduced_width: usize,
    failure_threshold: u32,
    recovery_streak: u32,
    cooldown: Duration,
    poll_interval: Duration,
    state: Mutex<ThrottleState>,
    condvar: Condvar,
}

/// RAII guard for a held slot; on drop it releases the slot and wakes
/// waiters so they can re-check the current width.
pub struct ThrottlePermit<'a> {
    throttle: &'a AdaptiveThrottle,
}

impl Drop for ThrottlePermit<'_> {
    fn drop(&mut self) {
        let mut state = self.throttle.state.lock();
        state.in_use = state.in_use.saturating_sub(1);
        self.throttle.condvar.notify_all();
    }
}

impl AdaptiveThrottle {
    pub fn new(engine_config: &EngineConfig) -> Self {
        Self {
            default_width: engine_config.throttle_default_width,
            reduced_width: engine_config.throttle_reduced_width,
            failure_threshold: engine_config.throttle_failure_threshold,
            recovery_streak: engine_config.throttle_recovery_streak,
            cooldown: engine_config.throttle_cooldown,
            poll_interval: defaults::THROTTLE_POLL_INTERVAL,
            state: Mutex::new(ThrottleState {
                width: engine_config.throttle_default_width,
                in_use: 0,
                consecutive_connection_like_failures: 0,
                consecutive_successes: 0,
                recovery_not_before: None,
            }),
            condvar: Condvar::new(),
        }
    }

    pub fn current_limit(&self) -> usize {
        self.state.lock().width
    }

    /// Blocks (with short polling so a concurrent shrink can wake us) until
    /// a slot under the current width is free.
    pub fn acquire(&self) -> ThrottlePermit<'_> {
        let mut state = self.state.lock();
        loop {
            if state.in_use < state.width {
                state.in_use += 1;
                return ThrottlePermit { throttle: self };
            }
            self.condvar.wait_for(&mut state, self.poll_interval);
        }
    }

    /// Records a call outcome and, if the width should shrink or recover as
    /// a result, emits the matching `adaptive_concurrency` event.
    pub fn record_outcome(&self, sink: &SinkHandle, session_id: Uuid, success: bool, error_message: Option<&str>) {
        let mut state = self.state.lock();
        let now = Instant::now();

        if success {
            state.consecutive_successes += 1;
            state.consecutive_connection_like_failures = 0;
        } else {
            state.consecutive_successes = 0;
            if error_message.map(is_connection_like).unwrap_or(false) {
                state.consecutive_connection_like_failures += 1;
            }
        }

        if state.width == self.default_width && state.consecutive_connection_like_failures >= self.failure_threshold {
            state.width = self.reduced_width;
            state.recovery_not_before = Some(now + self.cooldown);
            let concurrency_limit = state.width;
            drop(state);
            self.condvar.notify_all();
            sink.send(
                session_id,
                SessionEvent::AdaptiveConcurrency {
                    mode: ThrottleMode::Degraded,
                    concurrency_limit,
                    reason: "consecutive connection-like failures exceeded threshold".to_string(),
                    timestamp: chrono::Utc::now(),
                },
            );
            return;
        }

        if state.width == self.reduced_width
            && state.recovery_not_before.is_some_and(|deadline| now >= deadline)
            && state.consecutive_successes >= self.recovery_streak
        {
            state.width = self.default_width;
            state.recovery_not_before = None;
            let concurrency_limit = state.width;
            drop(state);
            self.condvar.notify_all();
            sink.send(
                session_id,
                SessionEvent::AdaptiveConcurrency {
                    mode: ThrottleMode::Recovered,
                    concurrency_limit,
                    reason: "consecutive successes reached recovery streak after cooldown".to_string(),
                    timestamp: chrono::Utc::now(),
                },
            );
        }
    }
}

impl Default for AdaptiveThrottle {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

/// `stagger_ms = worker_index * STAGGER_MS`, avoiding a thundering herd on
/// fan-out.
pub fn startup_stagger_ms(worker_index: usize) -> u64 {
    worker_index as u64 * defaults::STAGGER_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_like_matches_known_substrings() {
        assert!(is_connection_like("Connection Error: reset by peer"));
        assert!(is_connection_like("request timed out"));
        assert!(!is_connection_like("invalid api key"));
    }

    #[test]
    fn acquire_blocks_past_width_and_releases_on_drop() {
        let throttle = AdaptiveThrottle::new(&EngineConfig::default());
        let permits: Vec<_> = (0..throttle.current_limit()).map(|_| throttle.acquire()).collect();
        assert_eq!(throttle.state.lock().in_use, throttle.current_limit());
        drop(permits);
        assert_eq!(throttle.state.lock().in_use, 0);
    }

    #[test]
    fn startup_stagger_scales_with_worker_index() {
        assert_eq!(startup_stagger_ms(0), 0);
        assert_eq!(startup_stagger_ms(2), 2 * defaults::STAGGER_MS);
    }
}
