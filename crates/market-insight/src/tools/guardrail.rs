//! Session-level cost/error-rate ceiling, grounded in
//! `original_source/backend/tools/guardrail.py`.

use crate::config::EngineConfig;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SessionGuardrailStats {
    pub total_calls: u64,
    pub error_calls: u64,
    pub estimated_cost_usd: f64,
}

impl SessionGuardrailStats {
    pub fn error_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.error_calls as f64 / self.total_calls as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailTripReason {
    EstimatedCostExceeded,
    ErrorRateExceeded,
}

#[derive(Default)]
struct GuardrailInner {
    session_stats: HashMap<Uuid, SessionGuardrailStats>,
    disabled_sessions: HashSet<Uuid>,
    triggered_sessions: HashSet<Uuid>,
}

/// Per-session cost/error-rate ceiling over tool invocations. Trips once per
/// session and disables web search for every later call.
pub struct ToolGuardrail {
    max_estimated_cost_usd: f64,
    max_error_rate: f64,
    min_calls_for_error_rate: u64,
    pub action: &'static str,
    inner: Mutex<GuardrailInner>,
}

impl ToolGuardrail {
    pub fn new(engine_config: &EngineConfig) -> Self {
        Self {
            max_estimated_cost_usd: engine_config.guardrail_max_estimated_cost_usd,
            max_error_rate: engine_config.guardrail_max_error_rate,
            min_calls_for_error_rate: engine_config.guardrail_min_calls_for_error_rate.max(1) as u64,
            action: crate::config::defaults::GUARDRAIL_ACTION,
            inner: Mutex::new(GuardrailInner::default()),
        }
    }

    pub fn record_invocation(&self, session_id: Uuid, status: &str, estimated_cost_usd: f64) -> SessionGuardrailStats {
        let mut inner = self.inner.lock();
        let stats = inner.session_stats.entry(session_id).or_default();
        stats.total_calls += 1;
        if status.eq_ignore_ascii_case("error") || status.eq_ignore_ascii_case("failed") {
            stats.error_calls += 1;
        }
        stats.estimated_cost_usd += estimated_cost_usd;
        *stats
    }

    pub fn is_websearch_disabled(&self, session_id: Uuid) -> bool {
        self.inner.lock().disabled_sessions.contains(&session_id)
    }

    pub fn evaluate(&self, session_id: Uuid) -> (bool, Option<GuardrailTripReason>, SessionGuardrailStats) {
        let mut inner = self.inner.lock();
        let stats = inner.session_stats.entry(session_id).or_default().to_owned();

        let cost_hit = stats.estimated_cost_usd > self.max_estimated_cost_usd;
        let error_rate_hit = stats.total_calls >= self.min_calls_for_error_rate && stats.error_rate() > self.max_error_rate;

        if !(cost_hit || error_rate_hit) {
            return (false, None, stats);
        }

        let reason = if cost_hit { GuardrailTripReason::EstimatedCostExceeded } else { GuardrailTripReason::ErrorRateExceeded };
        inner.disabled_sessions.insert(session_id);
        (true, Some(reason), stats)
    }

    /// Idempotent per session: returns `true` only the first time it's
    /// called for a given session.
    pub fn mark_triggered(&self, session_id: Uuid) -> bool {
        self.inner.lock().triggered_sessions.insert(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guardrail_with_cost_ceiling(ceiling: f64) -> ToolGuardrail {
        let mut engine_config = EngineConfig::default();
        engine_config.guardrail_max_estimated_cost_usd = ceiling;
        ToolGuardrail::new(&engine_config)
    }

    #[test]
    fn trips_on_cost_exceeded() {
        let guardrail = guardrail_with_cost_ceiling(1.0);
        let session_id = Uuid::new_v4();
        guardrail.record_invocation(session_id, "completed", 1.5);
        let (triggered, reason, _) = guardrail.evaluate(session_id);
        assert!(triggered);
        assert_eq!(reason, Some(GuardrailTripReason::EstimatedCostExceeded));
        assert!(guardrail.is_websearch_disabled(session_id));
    }

    #[test]
    fn trips_on_error_rate_once_min_calls_reached() {
        let mut engine_config = EngineConfig::default();
        engine_config.guardrail_max_error_rate = 0.4;
        engine_config.guardrail_min_calls_for_error_rate = 2;
        let guardrail = ToolGuardrail::new(&engine_config);
        let session_id = Uuid::new_v4();
        guardrail.record_invocation(session_id, "error", 0.0);
        guardrail.record_invocation(session_id, "error", 0.0);
        let (triggered, reason, _) = guardrail.evaluate(session_id);
        assert!(triggered);
        assert_eq!(reason, Some(GuardrailTripReason::ErrorRateExceeded));
    }

    #[test]
    fn mark_triggered_is_idempotent() {
        let guardrail = guardrail_with_cost_ceiling(1.0);
        let session_id = Uuid::new_v4();
        assert!(guardrail.mark_triggered(session_id));
        assert!(!guardrail.mark_triggered(session_id));
    }

    #[test]
    fn sessions_are_isolated() {
        let guardrail = guardrail_with_cost_ceiling(1.0);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        guardrail.record_invocation(a, "completed", 5.0);
        guardrail.evaluate(a);
        assert!(guardrail.is_websearch_disabled(a));
        assert!(!guardrail.is_websearch_disabled(b));
    }
}
