//! Session Metrics Aggregator — a pure function of the session's persisted
//! rows, computed on demand when a session's status is queried.

use crate::config::defaults;
use crate::types::{InvocationStatus, Session};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityTier {
    High,
    Medium,
    Low,
}

impl StabilityTier {
    fn from_score(score: f64) -> Self {
        if score >= defaults::STABILITY_HIGH_THRESHOLD {
            StabilityTier::High
        } else if score >= defaults::STABILITY_MEDIUM_THRESHOLD {
            StabilityTier::Medium
        } else {
            StabilityTier::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub total_duration_ms: i64,
    pub completed_agents: usize,
    pub degraded_agents: usize,
    pub failed_agents: usize,
    pub retry_count: usize,
    pub guardrail_triggered_count: usize,
    pub adaptive_degraded_count: usize,
    pub evidence_coverage_rate: f64,
    pub stability_score: f64,
    pub stability_tier: StabilityTier,
}

/// Counts pulled from the workflow-events log (retry/guardrail/throttle
/// rows) and the tool-invocation log (error rate), since those aren't
/// tracked on `Session` itself.
#[derive(Debug, Clone, Default)]
pub struct EventLogCounts {
    pub retry_count: usize,
    pub guardrail_triggered_count: usize,
    pub adaptive_degraded_count: usize,
    pub tool_error_rate: f64,
}

pub fn compute(session: &Session, log: &EventLogCounts, claims_with_source: usize, claims_total: usize, now: DateTime<Utc>) -> SessionMetrics {
    let total_duration_ms = match session.completed_at {
        Some(completed_at) => (completed_at - session.started_at).num_milliseconds(),
        None => (now - session.started_at).num_milliseconds(),
    };

    let completed_agents = session.agent_results.iter().filter(|r| r.status == InvocationStatus::Completed).count();
    let degraded_agents = session.agent_results.iter().filter(|r| r.status == InvocationStatus::Degraded).count();
    let failed_agents = session.agent_results.iter().filter(|r| r.status == InvocationStatus::Failed).count();

    let evidence_coverage_rate = if claims_total == 0 { 0.0 } else { claims_with_source as f64 / claims_total as f64 };

    let penalty = 30.0 * failed_agents as f64
        + 12.0 * degraded_agents as f64
        + 15.0 * log.guardrail_triggered_count as f64
        + 6.0 * log.adaptive_degraded_count as f64
        + (2.0 * log.retry_count as f64).min(20.0)
        + (25.0 * log.tool_error_rate).min(25.0);

    let stability_score = (100.0 - penalty).clamp(0.0, 100.0);

    SessionMetrics {
        total_duration_ms,
        completed_agents,
        degraded_agents,
        failed_agents,
        retry_count: log.retry_count,
        guardrail_triggered_count: log.guardrail_triggered_count,
        adaptive_degraded_count: log.adaptive_degraded_count,
        evidence_coverage_rate,
        stability_score,
        stability_tier: StabilityTier::from_score(stability_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentResult, Phase, Profile};
    use uuid::Uuid;

    fn base_session() -> Session {
        let started_at = Utc::now();
        Session {
            id: Uuid::new_v4(),
            profile: Profile::default(),
            phase: Phase::Complete,
            agent_results: Vec::new(),
            debate_exchanges: Vec::new(),
            synthesized_report: None,
            error_message: None,
            started_at,
            completed_at: Some(started_at),
        }
    }

    #[test]
    fn perfect_session_scores_100() {
        let mut session = base_session();
        session.agent_results.push(AgentResult::completed(crate::types::AgentName::TrendScout, "ok".into(), vec![], 10));
        let metrics = compute(&session, &EventLogCounts::default(), 0, 0, Utc::now());
        assert_eq!(metrics.stability_score, 100.0);
        assert_eq!(metrics.stability_tier, StabilityTier::High);
    }

    #[test]
    fn score_never_goes_below_zero() {
        let session = base_session();
        let log = EventLogCounts { retry_count: 100, guardrail_triggered_count: 10, adaptive_degraded_count: 10, tool_error_rate: 1.0 };
        let metrics = compute(&session, &log, 0, 0, Utc::now());
        assert_eq!(metrics.stability_score, 0.0);
        assert_eq!(metrics.stability_tier, StabilityTier::Low);
    }

    #[test]
    fn evidence_coverage_rate_is_zero_with_no_claims() {
        let session = base_session();
        let metrics = compute(&session, &EventLogCounts::default(), 0, 0, Utc::now());
        assert_eq!(metrics.evidence_coverage_rate, 0.0);
    }
}
