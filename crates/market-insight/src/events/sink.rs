//! Write-behind pipeline: a bounded MPSC queue plus a single background
//! consumer that assembles chunk events into durable rows without ever
//! blocking the event producer.

use super::SessionEvent;
use crate::config::defaults;
use crate::db::{models::ToolInvocationRow, AgentResultRepository, DatabasePool, DebateExchangeRepository, SessionRepository, WorkflowEventRepository};
use crate::types::{AgentName, AgentResult, DebateExchange, DebateType, InvocationStatus};
use std::collections::HashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// One event bound to the session that produced it.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub session_id: Uuid,
    pub event: SessionEvent,
}

enum SinkMessage {
    Register { session_id: Uuid, enable_followup: bool },
    Event(EventEnvelope),
    Shutdown,
}

/// Producer-side clone. Enqueue is non-blocking: on a full queue the event
/// is dropped with a `warn` log, never blocking the session's event loop.
/// `external`, when set, tees every event to the caller-facing stream
/// `run_session` returns — independent of the write-behind queue above.
#[derive(Clone)]
pub struct SinkHandle {
    sender: mpsc::Sender<SinkMessage>,
    external: Option<mpsc::UnboundedSender<EventEnvelope>>,
}

impl SinkHandle {
    pub fn register_session(&self, session_id: Uuid, enable_followup: bool) {
        if self.sender.try_send(SinkMessage::Register { session_id, enable_followup }).is_err() {
            tracing::warn!(%session_id, "event sink queue full while registering session");
        }
    }

    pub fn send(&self, session_id: Uuid, event: SessionEvent) {
        if let Some(external) = &self.external {
            let _ = external.send(EventEnvelope { session_id, event: event.clone() });
        }
        if self.sender.try_send(SinkMessage::Event(EventEnvelope { session_id, event })).is_err() {
            tracing::warn!(%session_id, "event sink queue full, dropping event");
        }
    }

    /// Signals the consumer to drain what's queued and stop. Non-blocking,
    /// like every other send on this handle.
    pub fn shutdown(&self) {
        if self.sender.try_send(SinkMessage::Shutdown).is_err() {
            tracing::warn!("event sink queue full while requesting shutdown");
        }
    }
}

/// Sends the shutdown sentinel and waits for the consumer to drain and
/// exit, bounded so a stuck consumer can never hang the caller.
pub async fn shutdown_and_join(sink: &SinkHandle, consumer: tokio::task::JoinHandle<()>) {
    sink.shutdown();
    match tokio::time::timeout(defaults::EVENT_SINK_SHUTDOWN_JOIN, consumer).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, "event sink consumer task panicked during shutdown"),
        Err(_) => tracing::warn!("event sink consumer did not shut down within the bounded join window"),
    }
}

#[derive(Default)]
struct AgentBuffer {
    content: String,
    thinking: String,
}

#[derive(Default)]
struct ExchangeBuffer {
    round_number: u8,
    debate_type: Option<DebateType>,
    challenger: Option<AgentName>,
    responder: Option<AgentName>,
    challenge_content: String,
    response_content: String,
    followup_content: Option<String>,
    revised: bool,
}

struct ToolBuffer {
    agent_name: AgentName,
    tool_name: String,
    context: Option<String>,
    model_name: String,
    cache_hit: bool,
    input: serde_json::Value,
    started_at: chrono::DateTime<chrono::Utc>,
}

/// Spawns the single background consumer task and returns the handle
/// producers clone. The task runs until every `SinkHandle` is dropped.
pub fn spawn(pool: DatabasePool) -> (SinkHandle, tokio::task::JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(defaults::EVENT_SINK_QUEUE_CAPACITY);
    let handle = tokio::spawn(run(pool, receiver));
    (SinkHandle { sender, external: None }, handle)
}

/// Like [`spawn`], but additionally tees every event to an unbounded
/// channel for a live caller-facing stream (`run_session`'s return value).
pub fn spawn_with_external(pool: DatabasePool) -> (SinkHandle, mpsc::UnboundedReceiver<EventEnvelope>, tokio::task::JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(defaults::EVENT_SINK_QUEUE_CAPACITY);
    let (external_tx, external_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run(pool, receiver));
    (SinkHandle { sender, external: Some(external_tx) }, external_rx, handle)
}

async fn run(pool: DatabasePool, mut receiver: mpsc::Receiver<SinkMessage>) {
    let mut followup_enabled: HashMap<Uuid, bool> = HashMap::new();
    let mut round_types: HashMap<(Uuid, u8), DebateType> = HashMap::new();
    let mut agent_buffers: HashMap<(Uuid, AgentName), AgentBuffer> = HashMap::new();
    let mut exchange_buffers: HashMap<(Uuid, u8, AgentName, AgentName), ExchangeBuffer> = HashMap::new();
    let mut tool_buffers: HashMap<Uuid, ToolBuffer> = HashMap::new();

    while let Some(message) = receiver.recv().await {
        match message {
            SinkMessage::Register { session_id, enable_followup } => {
                followup_enabled.insert(session_id, enable_followup);
            }
            SinkMessage::Event(envelope) => {
                if let Err(err) = handle_event(&pool, &envelope, &followup_enabled, &mut round_types, &mut agent_buffers, &mut exchange_buffers, &mut tool_buffers).await {
                    tracing::error!(session_id = %envelope.session_id, error = %err, "event sink write failed");
                    tokio::time::sleep(defaults::EVENT_SINK_WRITE_FAILURE_BACKOFF).await;
                }
            }
            SinkMessage::Shutdown => break,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_event(
    pool: &DatabasePool,
    envelope: &EventEnvelope,
    followup_enabled: &HashMap<Uuid, bool>,
    round_types: &mut HashMap<(Uuid, u8), DebateType>,
    agent_buffers: &mut HashMap<(Uuid, AgentName), AgentBuffer>,
    exchange_buffers: &mut HashMap<(Uuid, u8, AgentName, AgentName), ExchangeBuffer>,
    tool_buffers: &mut HashMap<Uuid, ToolBuffer>,
) -> crate::db::DbResult<()> {
    let session_id = envelope.session_id;
    let sid = session_id.to_string();

    match &envelope.event {
        SessionEvent::DebateRoundStart { round_number, debate_type, .. } => {
            round_types.insert((session_id, *round_number), *debate_type);
            log_generic_event(pool, &sid, &envelope.event).await?;
        }
        SessionEvent::AgentChunk { agent, content } => {
            agent_buffers.entry((session_id, *agent)).or_default().content.push_str(content);
        }
        SessionEvent::AgentThinking { agent, content } => {
            agent_buffers.entry((session_id, *agent)).or_default().thinking.push_str(content);
        }
        SessionEvent::AgentEnd { agent, status, duration_ms, .. } => {
            let buffer = agent_buffers.remove(&(session_id, *agent));
            let (content, thinking) = buffer.map(|b| (b.content, b.thinking)).unwrap_or_default();
            let result = AgentResult {
                agent_name: *agent,
                content,
                thinking: if thinking.is_empty() { None } else { Some(thinking) },
                sources: Vec::new(),
                confidence: 0.6,
                duration_ms: *duration_ms,
                error_message: None,
                status: *status,
            };
            AgentResultRepository::upsert(pool, &sid, &result).await?;
        }
        SessionEvent::AgentError { agent, error, duration_ms, .. } => {
            agent_buffers.remove(&(session_id, *agent));
            let result = AgentResult::partial(*agent, error.clone(), *duration_ms);
            AgentResultRepository::upsert(pool, &sid, &result).await?;
        }

        SessionEvent::AgentChallenge { round_number, from_agent, to_agent, .. } => {
            let key = (session_id, *round_number, *from_agent, *to_agent);
            let debate_type = round_types.get(&(session_id, *round_number)).copied();
            let entry = exchange_buffers.entry(key).or_default();
            entry.round_number = *round_number;
            entry.challenger = Some(*from_agent);
            entry.responder = Some(*to_agent);
            entry.debate_type = debate_type;
        }
        SessionEvent::AgentChallengeEnd { round_number, from_agent, to_agent, challenge_content, .. } => {
            let key = (session_id, *round_number, *from_agent, *to_agent);
            let entry = exchange_buffers.entry(key).or_default();
            entry.challenge_content = challenge_content.clone();
        }
        SessionEvent::AgentRespond { round_number, from_agent, to_agent, .. } => {
            // flip rule: a respond's from_agent is the responder, so the exchange key uses the challenge pairing (to_agent, from_agent).
            let key = (session_id, *round_number, *to_agent, *from_agent);
            exchange_buffers.entry(key).or_default();
        }
        SessionEvent::AgentRespondEnd { round_number, from_agent, to_agent, response_content, revised, .. } => {
            let key = (session_id, *round_number, *to_agent, *from_agent);
            let flush_now = !followup_enabled.get(&session_id).copied().unwrap_or(true);
            let entry = exchange_buffers.entry(key).or_default();
            entry.response_content = response_content.clone();
            entry.revised = *revised;
            if flush_now {
                if let Some(buffer) = exchange_buffers.remove(&key) {
                    flush_exchange(pool, &sid, buffer).await?;
                }
            }
        }
        SessionEvent::AgentFollowupEnd { round_number, from_agent, to_agent, followup_content, .. } => {
            let key = (session_id, *round_number, *from_agent, *to_agent);
            if let Some(buffer) = exchange_buffers.get_mut(&key) {
                buffer.followup_content = Some(followup_content.clone());
            }
            if let Some(buffer) = exchange_buffers.remove(&key) {
                flush_exchange(pool, &sid, buffer).await?;
            }
        }

        SessionEvent::ToolStart { invocation_id, agent, tool, context, model_name, cache_hit, input, started_at, .. } => {
            tool_buffers.insert(
                *invocation_id,
                ToolBuffer {
                    agent_name: *agent,
                    tool_name: tool.clone(),
                    context: context.clone(),
                    model_name: model_name.clone(),
                    cache_hit: *cache_hit,
                    input: input.clone(),
                    started_at: *started_at,
                },
            );
        }
        SessionEvent::ToolEnd {
            invocation_id,
            output,
            duration_ms,
            finished_at,
            estimated_input_tokens,
            estimated_output_tokens,
            estimated_cost_usd,
            ..
        } => {
            let buffer = tool_buffers.remove(invocation_id);
            let row = build_tool_row(
                &sid,
                *invocation_id,
                buffer,
                "completed",
                Some(output.clone()),
                None,
                Some(*duration_ms),
                Some(*finished_at),
                Some(*estimated_input_tokens as i64),
                Some(*estimated_output_tokens as i64),
                Some(*estimated_cost_usd),
            );
            crate::db::ToolInvocationRepository::insert(pool, &row).await?;
        }
        SessionEvent::ToolError { invocation_id, output, error, duration_ms, finished_at, .. } => {
            let buffer = tool_buffers.remove(invocation_id);
            let row = build_tool_row(&sid, *invocation_id, buffer, "error", Some(output.clone()), Some(error.clone()), Some(*duration_ms), Some(*finished_at), None, None, None);
            crate::db::ToolInvocationRepository::insert(pool, &row).await?;
        }

        SessionEvent::OrchestratorEnd { final_report, evidence_pack, memory_snapshot, timestamp, .. } => {
            SessionRepository::complete(pool, &sid, final_report, &evidence_pack.to_string(), &memory_snapshot.to_string(), &timestamp.to_rfc3339()).await?;
        }
        SessionEvent::GuardrailTriggered { .. } => {
            SessionRepository::update_enable_websearch(pool, &sid, false).await?;
        }
        SessionEvent::Error { error, .. } => {
            SessionRepository::mark_failed(pool, &sid, error).await?;
        }
        other => {
            log_generic_event(pool, &sid, other).await?;
        }
    }
    Ok(())
}

async fn log_generic_event(pool: &DatabasePool, session_id: &str, event: &SessionEvent) -> crate::db::DbResult<()> {
    let payload = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
    let event_type = payload.get("event").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
    WorkflowEventRepository::insert(pool, session_id, &event_type, event.agent().map(|a| a.as_str()), None, None, &payload).await
}

#[allow(clippy::too_many_arguments)]
fn build_tool_row(
    session_id: &str,
    invocation_id: Uuid,
    buffer: Option<ToolBuffer>,
    status: &str,
    output: Option<serde_json::Value>,
    error_message: Option<String>,
    duration_ms: Option<u64>,
    finished_at: Option<chrono::DateTime<chrono::Utc>>,
    estimated_input_tokens: Option<i64>,
    estimated_output_tokens: Option<i64>,
    estimated_cost_usd: Option<f64>,
) -> ToolInvocationRow {
    let (agent_name, tool_name, context, model_name, cache_hit, input, started_at) = match buffer {
        Some(b) => (b.agent_name.to_string(), b.tool_name, b.context, b.model_name, b.cache_hit, b.input, b.started_at.to_rfc3339()),
        None => ("unknown".to_string(), "web_search".to_string(), None, "unknown".to_string(), false, serde_json::Value::Null, chrono::Utc::now().to_rfc3339()),
    };
    ToolInvocationRow {
        session_id: session_id.to_string(),
        invocation_id: invocation_id.to_string(),
        agent_name,
        tool_name,
        status: status.to_string(),
        duration_ms: duration_ms.map(|d| d as i64),
        input: input.to_string(),
        output: output.map(|o| o.to_string()),
        error_message,
        context,
        model_name,
        cache_hit: cache_hit as i64,
        estimated_input_tokens,
        estimated_output_tokens,
        estimated_cost_usd,
        started_at,
        finished_at: finished_at.map(|f| f.to_rfc3339()),
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

async fn flush_exchange(pool: &DatabasePool, session_id: &str, buffer: ExchangeBuffer) -> crate::db::DbResult<()> {
    let (Some(challenger), Some(responder), Some(debate_type)) = (buffer.challenger, buffer.responder, buffer.debate_type) else {
        let exchange = DebateExchange {
            round_number: buffer.round_number,
            debate_type: DebateType::PeerReview,
            challenger: buffer.challenger.unwrap_or(AgentName::DebateChallenger),
            responder: buffer.responder.unwrap_or(AgentName::DebateChallenger),
            challenge_content: buffer.challenge_content,
            response_content: buffer.response_content,
            followup_content: buffer.followup_content,
            revised: buffer.revised,
        };
        return DebateExchangeRepository::insert(pool, session_id, &exchange).await;
    };
    let exchange = DebateExchange {
        round_number: buffer.round_number,
        debate_type,
        challenger,
        responder,
        challenge_content: buffer.challenge_content,
        response_content: buffer.response_content,
        followup_content: buffer.followup_content,
        revised: buffer.revised,
    };
    DebateExchangeRepository::insert(pool, session_id, &exchange).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect;
    use crate::types::{Phase, Profile};
    use chrono::Utc;

    async fn setup() -> DatabasePool {
        connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn agent_chunks_assemble_into_one_row_on_end() {
        let pool = setup().await;
        let session_id = Uuid::new_v4();
        let session = crate::types::Session {
            id: session_id,
            profile: Profile::default(),
            phase: Phase::Gather,
            agent_results: Vec::new(),
            debate_exchanges: Vec::new(),
            synthesized_report: None,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        SessionRepository::upsert_new(&pool, &session, &crate::config::WorkflowConfig::default()).await.unwrap();

        let (handle, join) = spawn(pool.clone());
        handle.register_session(session_id, true);
        handle.send(session_id, SessionEvent::AgentChunk { agent: AgentName::TrendScout, content: "hel".into() });
        handle.send(session_id, SessionEvent::AgentChunk { agent: AgentName::TrendScout, content: "lo".into() });
        handle.send(
            session_id,
            SessionEvent::AgentEnd { agent: AgentName::TrendScout, status: InvocationStatus::Completed, duration_ms: 5, attempt: 1, timestamp: Utc::now() },
        );
        drop(handle);
        join.await.unwrap();

        let rows = AgentResultRepository::list_for_session(&pool, &session_id.to_string()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "hello");
    }
}
