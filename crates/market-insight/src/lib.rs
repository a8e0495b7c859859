//! The multi-agent market-insight workflow: four research workers fan out,
//! an optional peer-review and red-team debate round refines their findings,
//! and a synthesizer composes the final report. `run_session` is the single
//! entry point a transport layer (HTTP/SSE, CLI, batch) drives.

pub mod agents;
pub mod artifacts;
pub mod config;
pub mod db;
pub mod debate;
pub mod error;
pub mod events;
pub mod tools;
pub mod types;

use agents::{AgentPrompts, AgentRunner, DefaultAgentPrompts, Synthesizer};
use chrono::Utc;
use config::{EngineConfig, WorkflowConfig};
use db::DatabasePool;
use debate::{DebatePrompts, DebateRunner, DefaultDebatePrompts};
use events::sink::SinkHandle;
use events::SessionEvent;
use futures::{Stream, StreamExt};
use graph_checkpoint::{CheckpointEntry, CheckpointSaver};
use graph_engine::{merge_patches, StateGraph, StatePatch};
use llm_client::LlmClient;
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tools::{AdaptiveThrottle, ToolGuardrail, ToolRegistry};
use types::{AgentName, AgentResult, DebateExchange, DegradeMode, Phase, Profile, Session};
use uuid::Uuid;

/// Everything `run_session` needs beyond the caller's `Profile`. The LLM
/// client is a trait object so callers (and this crate's own tests) can
/// inject `llm_client::FakeLlmClient` in place of a real provider, which
/// this workspace never implements — that integration is out of scope.
pub struct OrchestratorConfig {
    pub llm_client: Arc<dyn LlmClient>,
    pub db: DatabasePool,
    pub workflow: WorkflowConfig,
    pub engine: EngineConfig,
    pub prompts: Arc<dyn AgentPrompts>,
    pub debate_prompts: Arc<dyn DebatePrompts>,
    pub checkpointer: Option<Arc<dyn CheckpointSaver>>,
    pub enable_websearch: bool,
}

impl OrchestratorConfig {
    pub fn new(llm_client: Arc<dyn LlmClient>, db: DatabasePool) -> Self {
        Self {
            llm_client,
            db,
            workflow: WorkflowConfig::default(),
            engine: EngineConfig::default(),
            prompts: Arc::new(DefaultAgentPrompts),
            debate_prompts: Arc::new(DefaultDebatePrompts),
            checkpointer: None,
            enable_websearch: true,
        }
    }
}

/// Runs one session end to end, returning a stream of every event it
/// produces. Durable persistence happens in the background regardless of
/// whether the caller keeps draining the stream.
pub fn run_session(profile: Profile, config: OrchestratorConfig) -> impl Stream<Item = SessionEvent> {
    let session_id = Uuid::new_v4();
    let (sink, receiver, consumer) = events::sink::spawn_with_external(config.db.clone());

    tokio::spawn(drive_session(session_id, profile, config, sink, consumer));

    UnboundedReceiverStream::new(receiver).map(|envelope| envelope.event)
}

async fn drive_session(session_id: Uuid, profile: Profile, config: OrchestratorConfig, sink: SinkHandle, consumer: tokio::task::JoinHandle<()>) {
    let OrchestratorConfig { llm_client, db, workflow, engine, prompts, debate_prompts, checkpointer, enable_websearch } = config;

    sink.register_session(session_id, workflow.enable_followup);

    if let Err(err) = workflow.validate_for_request() {
        sink.send(session_id, SessionEvent::Error { error: err.to_string(), session_id, timestamp: Utc::now() });
        events::sink::shutdown_and_join(&sink, consumer).await;
        return;
    }

    let started_at = Utc::now();
    let session = Session {
        id: session_id,
        profile: profile.clone(),
        phase: Phase::Init,
        agent_results: Vec::new(),
        debate_exchanges: Vec::new(),
        synthesized_report: None,
        error_message: None,
        started_at,
        completed_at: None,
    };

    if let Err(err) = db::SessionRepository::upsert_new(&db, &session, &workflow).await {
        sink.send(session_id, SessionEvent::Error { error: err.to_string(), session_id, timestamp: Utc::now() });
        events::sink::shutdown_and_join(&sink, consumer).await;
        return;
    }

    checkpoint(&checkpointer, session_id, 0, "orchestrator", serde_json::json!({ "phase": "init" })).await;

    let guardrail = Arc::new(ToolGuardrail::new(&engine));
    let engine_arc = Arc::new(engine.clone());
    let tool_registry = Arc::new(ToolRegistry::new(guardrail, engine_arc));
    let throttle = Arc::new(AdaptiveThrottle::new(&engine));

    sink.send(
        session_id,
        SessionEvent::OrchestratorStart { session_id, agents: AgentName::workers().to_vec(), debate_rounds: workflow.debate_rounds, timestamp: Utc::now() },
    );
    update_phase(&db, session_id, "gather").await;
    if let Err(err) = db::SessionRepository::update_enable_websearch(&db, &session_id.to_string(), enable_websearch && workflow.enable_websearch).await {
        tracing::warn!(%session_id, error = %err, "failed to persist enable_websearch flag");
    }

    // The four research workers are registered as named graph nodes and
    // dispatched through `CompiledGraph::fan_out`, the engine's parallel
    // barrier primitive, rather than a hand-rolled task set: each node
    // writes its result into the `agent_results` accumulator, and the
    // merged state is decoded back into the typed results below.
    let worker_ids: Vec<String> = AgentName::workers().iter().map(|agent| agent.as_str().to_string()).collect();
    let mut graph_builder = StateGraph::new().with_accumulator("agent_results");
    for (worker_index, agent) in AgentName::workers().into_iter().enumerate() {
        let runner = Arc::new(AgentRunner::new(llm_client.clone(), throttle.clone(), tool_registry.clone(), prompts.clone(), sink.clone()));
        let profile = profile.clone();
        let workflow = workflow.clone();
        let engine = engine.clone();
        graph_builder = graph_builder.add_node(agent.as_str(), move |_state| {
            let runner = runner.clone();
            let profile = profile.clone();
            let workflow = workflow.clone();
            let engine = engine.clone();
            async move {
                let result = runner.run_worker(session_id, agent, worker_index, &profile, &workflow, &engine, enable_websearch).await;
                let mut patch = StatePatch::new();
                if let Some(result) = result {
                    patch = patch.set("agent_results", serde_json::to_value(&result).expect("AgentResult always serializes"));
                }
                Ok(patch)
            }
        });
    }
    let worker_graph = match graph_builder.set_entry_point(AgentName::workers()[0].as_str()).compile() {
        Ok(graph) => graph,
        Err(err) => {
            sink.send(session_id, SessionEvent::Error { error: err.to_string(), session_id, timestamp: Utc::now() });
            mark_failed(&db, session_id, &err.to_string()).await;
            events::sink::shutdown_and_join(&sink, consumer).await;
            return;
        }
    };

    let dispatched = worker_ids.len();
    let fan_out_state = serde_json::Map::new();
    let fan_out_results = match worker_graph.fan_out(&worker_ids, &fan_out_state).await {
        Ok(results) => results,
        Err(err) => {
            sink.send(session_id, SessionEvent::Error { error: err.to_string(), session_id, timestamp: Utc::now() });
            mark_failed(&db, session_id, &err.to_string()).await;
            events::sink::shutdown_and_join(&sink, consumer).await;
            return;
        }
    };

    let mut gather_state = serde_json::Map::new();
    let patches: Vec<StatePatch> = fan_out_results
        .into_iter()
        .filter_map(|(node_id, result)| match result {
            Ok(patch) => Some(patch),
            Err(err) => {
                tracing::warn!(%session_id, %node_id, error = %err, "research worker node failed");
                None
            }
        })
        .collect();
    merge_patches(&mut gather_state, patches, &worker_graph.accumulators());

    let agent_results: Vec<AgentResult> = gather_state
        .get("agent_results")
        .and_then(|value| value.as_array())
        .map(|values| values.iter().filter_map(|value| serde_json::from_value(value.clone()).ok()).collect())
        .unwrap_or_default();

    for result in &agent_results {
        if let Err(err) = db::AgentResultRepository::upsert(&db, &session_id.to_string(), result).await {
            tracing::warn!(%session_id, error = %err, agent = result.agent_name.as_str(), "failed to persist agent result");
        }
    }

    // `on_exhaustion`'s degrade-mode branch is fixed for the whole session,
    // so a missing result under `degrade_mode = fail` can only mean that
    // branch ran; under `skip` a missing result is an ordinary drop.
    if workflow.degrade_mode == DegradeMode::Fail && agent_results.len() < dispatched {
        let message = "a research worker exhausted retries and degrade_mode=fail aborted the session".to_string();
        mark_failed(&db, session_id, &message).await;
        events::sink::shutdown_and_join(&sink, consumer).await;
        return;
    }

    sink.send(
        session_id,
        SessionEvent::GatherComplete {
            completed_agents: agent_results.iter().map(|r| r.agent_name).collect(),
            total_results: agent_results.len(),
            timestamp: Utc::now(),
        },
    );

    checkpoint(&checkpointer, session_id, 1, "gather", serde_json::json!({ "phase": "gather", "results": agent_results.len() })).await;

    let debate_runner = DebateRunner::new(llm_client.clone(), throttle.clone(), debate_prompts, sink.clone());
    let mut debate_exchanges: Vec<DebateExchange> = Vec::new();

    if workflow.debate_rounds >= 1 {
        update_phase(&db, session_id, "debate_peer").await;
        match debate_runner.run_peer_round(session_id, 1, &agent_results, &workflow).await {
            Ok(exchanges) => debate_exchanges.extend(exchanges),
            Err(message) => {
                sink.send(session_id, SessionEvent::Error { error: message.clone(), session_id, timestamp: Utc::now() });
                mark_failed(&db, session_id, &message).await;
                events::sink::shutdown_and_join(&sink, consumer).await;
                return;
            }
        }
    }

    if workflow.debate_rounds >= 2 {
        update_phase(&db, session_id, "debate_redteam").await;
        match debate_runner.run_redteam_round(session_id, 2, &agent_results, &workflow).await {
            Ok(exchanges) => debate_exchanges.extend(exchanges),
            Err(message) => {
                sink.send(session_id, SessionEvent::Error { error: message.clone(), session_id, timestamp: Utc::now() });
                mark_failed(&db, session_id, &message).await;
                events::sink::shutdown_and_join(&sink, consumer).await;
                return;
            }
        }
    }

    for exchange in &debate_exchanges {
        if let Err(err) = db::DebateExchangeRepository::insert(&db, &session_id.to_string(), exchange).await {
            tracing::warn!(%session_id, error = %err, "failed to persist debate exchange");
        }
    }

    checkpoint(&checkpointer, session_id, 2, "debate", serde_json::json!({ "phase": "debate", "exchanges": debate_exchanges.len() })).await;

    update_phase(&db, session_id, "synthesize").await;
    let synthesizer = Synthesizer::new(Some(llm_client), throttle, sink.clone());
    let outcome = synthesizer.run(session_id, &profile, &agent_results, &debate_exchanges, &workflow, &engine).await;

    let generated_at = Utc::now();
    if let Err(err) = db::SessionRepository::complete(
        &db,
        &session_id.to_string(),
        &outcome.final_report,
        &outcome.evidence_pack.to_string(),
        &outcome.memory_snapshot.to_string(),
        &generated_at.to_rfc3339(),
    )
    .await
    {
        tracing::warn!(%session_id, error = %err, "failed to persist session completion");
    }

    checkpoint(&checkpointer, session_id, 3, "synthesizer", serde_json::json!({ "phase": "complete" })).await;

    sink.send(
        session_id,
        SessionEvent::OrchestratorEnd {
            session_id,
            final_report: outcome.final_report,
            report_html_url: None,
            evidence_pack: outcome.evidence_pack,
            memory_snapshot: outcome.memory_snapshot,
            timestamp: Utc::now(),
        },
    );

    events::sink::shutdown_and_join(&sink, consumer).await;
}

async fn update_phase(db: &DatabasePool, session_id: Uuid, phase: &str) {
    if let Err(err) = db::SessionRepository::update_phase(db, &session_id.to_string(), phase).await {
        tracing::warn!(%session_id, error = %err, phase, "failed to persist phase transition");
    }
}

async fn mark_failed(db: &DatabasePool, session_id: Uuid, message: &str) {
    if let Err(err) = db::SessionRepository::mark_failed(db, &session_id.to_string(), message).await {
        tracing::warn!(%session_id, error = %err, "failed to persist session failure");
    }
}

async fn checkpoint(checkpointer: &Option<Arc<dyn CheckpointSaver>>, session_id: Uuid, step: usize, node_id: &str, value: serde_json::Value) {
    let Some(saver) = checkpointer else { return };
    if let Err(err) = saver.put(&session_id.to_string(), CheckpointEntry::new(step, node_id, value)).await {
        tracing::warn!(%session_id, error = %err, node_id, "failed to write checkpoint");
    }
}
