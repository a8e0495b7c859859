//! `sqlx::FromRow` row shapes, one per table in the persistence schema.
//! Timestamps are stored as RFC3339 strings and JSON-shaped columns as text,
//! matching the teacher's `orchestrator::db::models::session` convention.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRow {
    pub id: String,
    pub profile: String,
    pub target_market: Option<String>,
    pub supply_chain: Option<String>,
    pub seller_type: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub debate_rounds: i64,
    pub enable_followup: i64,
    pub enable_websearch: i64,
    pub status: String,
    pub phase: String,
    pub current_debate_round: i64,
    pub synthesized_report: Option<String>,
    pub evidence_pack: Option<String>,
    pub memory_snapshot: Option<String>,
    pub evidence_generated_at: Option<String>,
    pub memory_snapshot_generated_at: Option<String>,
    pub error_message: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentResultRow {
    pub session_id: String,
    pub agent_name: String,
    pub status: String,
    pub duration_ms: i64,
    pub content: String,
    pub thinking: Option<String>,
    pub sources: String,
    pub confidence: f64,
    pub error_message: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DebateExchangeRow {
    pub session_id: String,
    pub round_number: i64,
    pub debate_type: String,
    pub challenger: String,
    pub responder: String,
    pub challenge_content: String,
    pub response_content: String,
    pub followup_content: Option<String>,
    pub revised: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowEventRow {
    pub session_id: String,
    pub event_type: String,
    pub agent_name: Option<String>,
    pub tool_name: Option<String>,
    pub node_id: Option<String>,
    pub payload: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ToolInvocationRow {
    pub session_id: String,
    pub invocation_id: String,
    pub agent_name: String,
    pub tool_name: String,
    pub status: String,
    pub duration_ms: Option<i64>,
    pub input: String,
    pub output: Option<String>,
    pub error_message: Option<String>,
    pub context: Option<String>,
    pub model_name: String,
    pub cache_hit: i64,
    pub estimated_input_tokens: Option<i64>,
    pub estimated_output_tokens: Option<i64>,
    pub estimated_cost_usd: Option<f64>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub created_at: String,
}
