//! One repository per table, grounded in the teacher's
//! `orchestrator::db::repositories::session_repo` — static async methods
//! over a shared pool, idempotent upsert primitives on a fixed schema.

use super::connection::DatabasePool;
use super::error::DbResult;
use super::models::{AgentResultRow, DebateExchangeRow, SessionRow, ToolInvocationRow, WorkflowEventRow};
use crate::config::WorkflowConfig;
use crate::types::{AgentResult, DebateExchange, Session};
use chrono::Utc;

pub struct SessionRepository;

impl SessionRepository {
    pub async fn upsert_new(pool: &DatabasePool, session: &Session, config: &WorkflowConfig) -> DbResult<()> {
        let profile_json = serde_json::to_string(&session.profile)?;
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO sessions (
                id, profile, target_market, supply_chain, seller_type, min_price, max_price,
                debate_rounds, enable_followup, enable_websearch, status, phase,
                current_debate_round, started_at, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET phase = excluded.phase, status = excluded.status",
        )
        .bind(session.id.to_string())
        .bind(profile_json)
        .bind(&session.profile.target_market)
        .bind(&session.profile.supply_chain)
        .bind(&session.profile.seller_type)
        .bind(session.profile.min_price)
        .bind(session.profile.max_price)
        .bind(config.debate_rounds as i64)
        .bind(config.enable_followup as i64)
        .bind(config.enable_websearch as i64)
        .bind("running")
        .bind(serde_json::to_value(session.phase)?.as_str().unwrap_or("init").to_string())
        .bind(0i64)
        .bind(session.started_at.to_rfc3339())
        .bind(now)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn update_phase(pool: &DatabasePool, id: &str, phase: &str) -> DbResult<()> {
        sqlx::query("UPDATE sessions SET phase = ? WHERE id = ?").bind(phase).bind(id).execute(pool).await?;
        Ok(())
    }

    pub async fn update_enable_websearch(pool: &DatabasePool, id: &str, enabled: bool) -> DbResult<()> {
        sqlx::query("UPDATE sessions SET enable_websearch = ? WHERE id = ?")
            .bind(enabled as i64)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn mark_failed(pool: &DatabasePool, id: &str, error_message: &str) -> DbResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE sessions SET status = 'failed', phase = 'error', error_message = ?, completed_at = ? WHERE id = ?")
            .bind(error_message)
            .bind(now)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn complete(
        pool: &DatabasePool,
        id: &str,
        final_report: &str,
        evidence_pack_json: &str,
        memory_snapshot_json: &str,
        generated_at: &str,
    ) -> DbResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE sessions SET status = 'completed', phase = 'complete', synthesized_report = ?,
             evidence_pack = ?, memory_snapshot = ?, evidence_generated_at = ?, memory_snapshot_generated_at = ?,
             completed_at = ? WHERE id = ?",
        )
        .bind(final_report)
        .bind(evidence_pack_json)
        .bind(memory_snapshot_json)
        .bind(generated_at)
        .bind(generated_at)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get(pool: &DatabasePool, id: &str) -> DbResult<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE id = ?").bind(id).fetch_optional(pool).await?;
        Ok(row)
    }
}

pub struct AgentResultRepository;

impl AgentResultRepository {
    pub async fn upsert(pool: &DatabasePool, session_id: &str, result: &AgentResult) -> DbResult<()> {
        let now = Utc::now().to_rfc3339();
        let sources_json = serde_json::to_string(&result.sources)?;
        let status_json = serde_json::to_value(result.status)?;
        let agent_json = serde_json::to_value(result.agent_name)?;
        sqlx::query(
            "INSERT INTO agent_results (
                session_id, agent_name, status, duration_ms, content, thinking, sources,
                confidence, error_message, created_at, completed_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id, agent_name) DO UPDATE SET
                status = excluded.status, duration_ms = excluded.duration_ms,
                content = excluded.content, thinking = excluded.thinking, sources = excluded.sources,
                confidence = excluded.confidence, error_message = excluded.error_message,
                completed_at = excluded.completed_at",
        )
        .bind(session_id)
        .bind(agent_json.as_str().unwrap_or("unknown"))
        .bind(status_json.as_str().unwrap_or("failed"))
        .bind(result.duration_ms as i64)
        .bind(&result.content)
        .bind(&result.thinking)
        .bind(sources_json)
        .bind(result.confidence)
        .bind(&result.error_message)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn list_for_session(pool: &DatabasePool, session_id: &str) -> DbResult<Vec<AgentResultRow>> {
        let rows = sqlx::query_as::<_, AgentResultRow>("SELECT * FROM agent_results WHERE session_id = ?")
            .bind(session_id)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }
}

pub struct DebateExchangeRepository;

impl DebateExchangeRepository {
    pub async fn insert(pool: &DatabasePool, session_id: &str, exchange: &DebateExchange) -> DbResult<()> {
        let now = Utc::now().to_rfc3339();
        let debate_type_json = serde_json::to_value(exchange.debate_type)?;
        let challenger_json = serde_json::to_value(exchange.challenger)?;
        let responder_json = serde_json::to_value(exchange.responder)?;
        sqlx::query(
            "INSERT INTO debate_exchanges (
                session_id, round_number, debate_type, challenger, responder,
                challenge_content, response_content, followup_content, revised, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(exchange.round_number as i64)
        .bind(debate_type_json.as_str().unwrap_or("peer_review"))
        .bind(challenger_json.as_str().unwrap_or("unknown"))
        .bind(responder_json.as_str().unwrap_or("unknown"))
        .bind(&exchange.challenge_content)
        .bind(&exchange.response_content)
        .bind(&exchange.followup_content)
        .bind(exchange.revised as i64)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn list_for_session(pool: &DatabasePool, session_id: &str) -> DbResult<Vec<DebateExchangeRow>> {
        let rows = sqlx::query_as::<_, DebateExchangeRow>("SELECT * FROM debate_exchanges WHERE session_id = ?")
            .bind(session_id)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }
}

pub struct WorkflowEventRepository;

impl WorkflowEventRepository {
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        pool: &DatabasePool,
        session_id: &str,
        event_type: &str,
        agent_name: Option<&str>,
        tool_name: Option<&str>,
        node_id: Option<&str>,
        payload: &serde_json::Value,
    ) -> DbResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO workflow_events (session_id, event_type, agent_name, tool_name, node_id, payload, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(event_type)
        .bind(agent_name)
        .bind(tool_name)
        .bind(node_id)
        .bind(payload.to_string())
        .bind(now)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn count_by_type(pool: &DatabasePool, session_id: &str, event_type: &str) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workflow_events WHERE session_id = ? AND event_type = ?")
            .bind(session_id)
            .bind(event_type)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    pub async fn list_for_session(pool: &DatabasePool, session_id: &str) -> DbResult<Vec<WorkflowEventRow>> {
        let rows = sqlx::query_as::<_, WorkflowEventRow>("SELECT * FROM workflow_events WHERE session_id = ? ORDER BY created_at ASC")
            .bind(session_id)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }
}

pub struct ToolInvocationRepository;

impl ToolInvocationRepository {
    pub async fn insert(pool: &DatabasePool, row: &ToolInvocationRow) -> DbResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO tool_invocations (
                session_id, invocation_id, agent_name, tool_name, status, duration_ms, input, output,
                error_message, context, model_name, cache_hit, estimated_input_tokens, estimated_output_tokens,
                estimated_cost_usd, started_at, finished_at, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(invocation_id) DO UPDATE SET
                status = excluded.status, duration_ms = excluded.duration_ms, output = excluded.output,
                error_message = excluded.error_message, estimated_input_tokens = excluded.estimated_input_tokens,
                estimated_output_tokens = excluded.estimated_output_tokens, estimated_cost_usd = excluded.estimated_cost_usd,
                finished_at = excluded.finished_at",
        )
        .bind(&row.session_id)
        .bind(&row.invocation_id)
        .bind(&row.agent_name)
        .bind(&row.tool_name)
        .bind(&row.status)
        .bind(row.duration_ms)
        .bind(&row.input)
        .bind(&row.output)
        .bind(&row.error_message)
        .bind(&row.context)
        .bind(&row.model_name)
        .bind(row.cache_hit)
        .bind(row.estimated_input_tokens)
        .bind(row.estimated_output_tokens)
        .bind(row.estimated_cost_usd)
        .bind(&row.started_at)
        .bind(&row.finished_at)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn error_rate_for_session(pool: &DatabasePool, session_id: &str) -> DbResult<f64> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tool_invocations WHERE session_id = ?")
            .bind(session_id)
            .fetch_one(pool)
            .await?;
        if total.0 == 0 {
            return Ok(0.0);
        }
        let errors: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tool_invocations WHERE session_id = ? AND status = 'error'")
            .bind(session_id)
            .fetch_one(pool)
            .await?;
        Ok(errors.0 as f64 / total.0 as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::connect;
    use crate::types::{AgentName, Phase, Profile};
    use uuid::Uuid;

    async fn setup() -> DatabasePool {
        connect("sqlite::memory:").await.unwrap()
    }

    fn sample_session() -> Session {
        Session {
            id: Uuid::new_v4(),
            profile: Profile::default(),
            phase: Phase::Init,
            agent_results: Vec::new(),
            debate_exchanges: Vec::new(),
            synthesized_report: None,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn session_round_trips() {
        let pool = setup().await;
        let session = sample_session();
        SessionRepository::upsert_new(&pool, &session, &WorkflowConfig::default()).await.unwrap();
        let row = SessionRepository::get(&pool, &session.id.to_string()).await.unwrap().unwrap();
        assert_eq!(row.id, session.id.to_string());
        assert_eq!(row.status, "running");
    }

    #[tokio::test]
    async fn agent_result_upsert_is_keyed_by_session_and_agent() {
        let pool = setup().await;
        let session = sample_session();
        SessionRepository::upsert_new(&pool, &session, &WorkflowConfig::default()).await.unwrap();
        let result = AgentResult::completed(AgentName::TrendScout, "first".into(), vec![], 5);
        AgentResultRepository::upsert(&pool, &session.id.to_string(), &result).await.unwrap();
        let updated = AgentResult::completed(AgentName::TrendScout, "second".into(), vec![], 9);
        AgentResultRepository::upsert(&pool, &session.id.to_string(), &updated).await.unwrap();

        let rows = AgentResultRepository::list_for_session(&pool, &session.id.to_string()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "second");
    }

    #[tokio::test]
    async fn workflow_event_count_by_type() {
        let pool = setup().await;
        let session = sample_session();
        SessionRepository::upsert_new(&pool, &session, &WorkflowConfig::default()).await.unwrap();
        WorkflowEventRepository::insert(&pool, &session.id.to_string(), "retry", None, None, None, &serde_json::json!({})).await.unwrap();
        WorkflowEventRepository::insert(&pool, &session.id.to_string(), "retry", None, None, None, &serde_json::json!({})).await.unwrap();
        let count = WorkflowEventRepository::count_by_type(&pool, &session.id.to_string(), "retry").await.unwrap();
        assert_eq!(count, 2);
    }
}
