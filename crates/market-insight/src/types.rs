//! Core data model: `Session`, `AgentResult`, `DebateExchange`, `ToolInvocation`,
//! and the in-flight `WorkflowState` the graph engine operates on.

use llm_client::NormalizedSource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentName {
    TrendScout,
    CompetitorAnalyst,
    RegulationChecker,
    SocialSentinel,
    Synthesizer,
    DebateChallenger,
}

impl AgentName {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentName::TrendScout => "trend_scout",
            AgentName::CompetitorAnalyst => "competitor_analyst",
            AgentName::RegulationChecker => "regulation_checker",
            AgentName::SocialSentinel => "social_sentinel",
            AgentName::Synthesizer => "synthesizer",
            AgentName::DebateChallenger => "debate_challenger",
        }
    }

    /// The four research workers fanned out by the `orchestrator` node, in
    /// dispatch order.
    pub fn workers() -> [AgentName; 4] {
        [
            AgentName::TrendScout,
            AgentName::CompetitorAnalyst,
            AgentName::RegulationChecker,
            AgentName::SocialSentinel,
        ]
    }
}

impl std::fmt::Display for AgentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateType {
    PeerReview,
    RedTeam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeMode {
    Skip,
    Partial,
    Fail,
}

impl From<DegradeMode> for graph_engine::DegradeMode {
    fn from(mode: DegradeMode) -> Self {
        match mode {
            DegradeMode::Skip => graph_engine::DegradeMode::Skip,
            DegradeMode::Partial => graph_engine::DegradeMode::Partial,
            DegradeMode::Fail => graph_engine::DegradeMode::Fail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Gather,
    DebatePeer,
    DebateRedteam,
    Synthesize,
    Complete,
    Error,
}

impl Phase {
    /// The defined monotonic ordering nodes may move `phase` through.
    pub fn order() -> [Phase; 7] {
        [
            Phase::Init,
            Phase::Gather,
            Phase::DebatePeer,
            Phase::DebateRedteam,
            Phase::Synthesize,
            Phase::Complete,
            Phase::Error,
        ]
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Running,
    Completed,
    Degraded,
    Skipped,
    Failed,
}

/// One worker's (or the synthesizer's) contribution to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_name: AgentName,
    pub content: String,
    pub thinking: Option<String>,
    pub sources: Vec<NormalizedSource>,
    pub confidence: f64,
    pub duration_ms: u64,
    pub error_message: Option<String>,
    pub status: InvocationStatus,
}

impl AgentResult {
    pub fn completed(agent_name: AgentName, content: String, sources: Vec<NormalizedSource>, duration_ms: u64) -> Self {
        Self {
            agent_name,
            content,
            thinking: None,
            sources,
            confidence: 0.6,
            duration_ms,
            error_message: None,
            status: InvocationStatus::Completed,
        }
    }

    pub fn partial(agent_name: AgentName, error_message: String, duration_ms: u64) -> Self {
        Self {
            agent_name,
            content: String::new(),
            thinking: None,
            sources: Vec::new(),
            confidence: 0.6,
            duration_ms,
            error_message: Some(error_message),
            status: InvocationStatus::Degraded,
        }
    }
}

/// One round between one challenger and one responder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateExchange {
    pub round_number: u8,
    pub debate_type: DebateType,
    pub challenger: AgentName,
    pub responder: AgentName,
    pub challenge_content: String,
    pub response_content: String,
    pub followup_content: Option<String>,
    pub revised: bool,
}

/// One `web_search` invocation's full lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub invocation_id: uuid::Uuid,
    pub tool_name: String,
    pub agent_name: AgentName,
    pub context: String,
    pub model_name: String,
    pub cache_hit: bool,
    pub input: Value,
    pub output: Option<Value>,
    pub status: InvocationStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_ms: Option<u64>,
    pub estimated_input_tokens: Option<u64>,
    pub estimated_output_tokens: Option<u64>,
    pub estimated_cost_usd: Option<f64>,
}

/// The opaque user-supplied request: target market, category, seller type,
/// price range, plus whatever extra string/number fields a caller sends.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profile {
    pub target_market: Option<String>,
    pub supply_chain: Option<String>,
    pub seller_type: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// The graph-internal in-flight shape: accumulated results plus routing
/// metadata. `agent_results` and `debate_exchanges` carry list-append
/// accumulation semantics at the barrier; everything else is last-writer-wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub session_id: uuid::Uuid,
    pub profile: Profile,
    pub phase: Phase,
    pub current_debate_round: u8,
    pub current_debate_type: Option<DebateType>,
    pub agent_results: Vec<AgentResult>,
    pub debate_exchanges: Vec<DebateExchange>,
    pub final_report: Option<String>,
}

impl WorkflowState {
    pub fn new(session_id: uuid::Uuid, profile: Profile) -> Self {
        Self {
            session_id,
            profile,
            phase: Phase::Init,
            current_debate_round: 0,
            current_debate_type: None,
            agent_results: Vec::new(),
            debate_exchanges: Vec::new(),
            final_report: None,
        }
    }

    pub fn result_for(&self, agent: AgentName) -> Option<&AgentResult> {
        self.agent_results.iter().find(|r| r.agent_name == agent)
    }
}

/// The session record the caller sees end-to-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: uuid::Uuid,
    pub profile: Profile,
    pub phase: Phase,
    pub agent_results: Vec<AgentResult>,
    pub debate_exchanges: Vec<DebateExchange>,
    pub synthesized_report: Option<String>,
    pub error_message: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}
