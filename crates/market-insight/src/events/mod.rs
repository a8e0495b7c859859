//! The event stream contract: one tagged enum covering every row a session
//! may emit, consumed by the write-behind sink and (eventually) an SSE
//! transport that sits outside this crate.

pub mod sink;
pub mod metrics;

use crate::types::{AgentName, DebateType, InvocationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Agent,
    DebateExchange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleMode {
    Degraded,
    Recovered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailReason {
    EstimatedCostExceeded,
    ErrorRateExceeded,
}

/// Every typed event this session may emit. `#[serde(tag = "event")]` gives
/// each variant a `"event": "..."` discriminant matching the external
/// contract's naming exactly (snake_case, e.g. `agent_challenge_end`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    OrchestratorStart {
        session_id: Uuid,
        agents: Vec<AgentName>,
        debate_rounds: u8,
        timestamp: DateTime<Utc>,
    },
    OrchestratorEnd {
        session_id: Uuid,
        final_report: String,
        report_html_url: Option<String>,
        evidence_pack: Value,
        memory_snapshot: Value,
        timestamp: DateTime<Utc>,
    },

    AgentStart {
        agent: AgentName,
        thinking_mode: String,
        adaptive_concurrency_limit: usize,
        timestamp: DateTime<Utc>,
    },
    AgentChunk {
        agent: AgentName,
        content: String,
    },
    AgentThinking {
        agent: AgentName,
        content: String,
    },
    AgentEnd {
        agent: AgentName,
        status: InvocationStatus,
        duration_ms: u64,
        attempt: usize,
        timestamp: DateTime<Utc>,
    },
    AgentError {
        agent: AgentName,
        error: String,
        duration_ms: u64,
        attempt: usize,
        degrade_mode: crate::types::DegradeMode,
        timestamp: DateTime<Utc>,
    },

    GatherComplete {
        completed_agents: Vec<AgentName>,
        total_results: usize,
        timestamp: DateTime<Utc>,
    },

    DebateRoundStart {
        round_number: u8,
        debate_type: DebateType,
        timestamp: DateTime<Utc>,
    },
    DebateRoundEnd {
        round_number: u8,
        debate_type: DebateType,
        exchanges_count: usize,
        timestamp: DateTime<Utc>,
    },

    AgentChallenge {
        round_number: u8,
        from_agent: AgentName,
        to_agent: AgentName,
        attempt: usize,
    },
    AgentChallengeEnd {
        round_number: u8,
        from_agent: AgentName,
        to_agent: AgentName,
        challenge_content: String,
        content_preview: String,
        attempt: usize,
    },
    AgentRespond {
        round_number: u8,
        from_agent: AgentName,
        to_agent: AgentName,
        attempt: usize,
    },
    AgentRespondEnd {
        round_number: u8,
        from_agent: AgentName,
        to_agent: AgentName,
        response_content: String,
        revised: bool,
        content_preview: String,
        attempt: usize,
    },
    AgentFollowup {
        round_number: u8,
        from_agent: AgentName,
        to_agent: AgentName,
    },
    AgentFollowupEnd {
        round_number: u8,
        from_agent: AgentName,
        to_agent: AgentName,
        followup_content: String,
        content_preview: String,
    },

    ToolStart {
        invocation_id: Uuid,
        tool: String,
        agent: AgentName,
        context: Option<String>,
        model_name: String,
        cache_hit: bool,
        input: Value,
        started_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    ToolEnd {
        invocation_id: Uuid,
        tool: String,
        agent: AgentName,
        context: Option<String>,
        model_name: String,
        cache_hit: bool,
        input: Value,
        output: Value,
        sources_count: usize,
        duration_ms: u64,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        estimated_input_tokens: u64,
        estimated_output_tokens: u64,
        estimated_cost_usd: f64,
        cost_mode: String,
        timestamp: DateTime<Utc>,
    },
    ToolError {
        invocation_id: Uuid,
        tool: String,
        agent: AgentName,
        context: Option<String>,
        model_name: String,
        cache_hit: bool,
        input: Value,
        output: Value,
        error: String,
        duration_ms: u64,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        estimated_input_tokens: u64,
        estimated_output_tokens: u64,
        estimated_cost_usd: f64,
        cost_mode: String,
        timestamp: DateTime<Utc>,
    },

    Retry {
        target_type: TargetType,
        target_id: String,
        attempt: usize,
        max_attempts: usize,
        error: String,
        backoff_ms: u64,
    },

    AdaptiveConcurrency {
        mode: ThrottleMode,
        concurrency_limit: usize,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    GuardrailTriggered {
        session_id: Uuid,
        action: String,
        reason: GuardrailReason,
        stats: Value,
        timestamp: DateTime<Utc>,
    },

    Error {
        error: String,
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    /// `true` for the five chunk-carrying events the sink must buffer rather
    /// than write row-per-row.
    pub fn is_chunk(&self) -> bool {
        matches!(
            self,
            SessionEvent::AgentChunk { .. } | SessionEvent::AgentThinking { .. }
        )
    }

    pub fn agent(&self) -> Option<AgentName> {
        match self {
            SessionEvent::AgentStart { agent, .. }
            | SessionEvent::AgentChunk { agent, .. }
            | SessionEvent::AgentThinking { agent, .. }
            | SessionEvent::AgentEnd { agent, .. }
            | SessionEvent::AgentError { agent, .. }
            | SessionEvent::ToolStart { agent, .. }
            | SessionEvent::ToolEnd { agent, .. }
            | SessionEvent::ToolError { agent, .. } => Some(*agent),
            _ => None,
        }
    }
}
