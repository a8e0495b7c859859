//! Agent Runner: prompts → throttled streaming LLM call → accumulated
//! output, wrapped in the shared retry/degrade policy.

use crate::config::{EngineConfig, WorkflowConfig};
use crate::events::{SessionEvent, TargetType};
use crate::events::sink::SinkHandle;
use crate::tools::registry::ToolRegistry;
use crate::tools::throttle::AdaptiveThrottle;
use crate::types::{AgentName, AgentResult, InvocationStatus, Profile};
use chrono::Utc;
use futures::StreamExt;
use graph_engine::RetryPolicy;
use llm_client::{CallConfig, LlmClient, LlmEvent, Message, NormalizedSource, ThinkingMode};
use std::sync::Arc;
use uuid::Uuid;

/// Clearly-labeled stand-in for the out-of-scope prompt/role policy layer:
/// two plain-text callbacks per agent.
pub trait AgentPrompts: Send + Sync {
    fn system_prompt(&self, agent: AgentName, profile: &Profile) -> String;
    fn user_prompt(&self, agent: AgentName, profile: &Profile) -> String;

    /// Agent-specific pure post-processing of the joined content. Default
    /// is identity.
    fn postprocess(&self, _agent: AgentName, content: String) -> String {
        content
    }
}

/// The default placeholder prompt provider: a minimal, explicitly
/// synthetic stand-in, not a real role definition.
pub struct DefaultAgentPrompts;

impl AgentPrompts for DefaultAgentPrompts {
    fn system_prompt(&self, agent: AgentName, _profile: &Profile) -> String {
        format!("You are the {} research worker for a market-insight session.", agent.as_str())
    }

    fn user_prompt(&self, agent: AgentName, profile: &Profile) -> String {
        format!(
            "Analyze the {:?} market in category {:?} for seller type {:?} (price range {:?}-{:?}) from the {} perspective.",
            profile.target_market, profile.supply_chain, profile.seller_type, profile.min_price, profile.max_price, agent.as_str()
        )
    }
}

pub struct AgentRunner {
    llm_client: Arc<dyn LlmClient>,
    throttle: Arc<AdaptiveThrottle>,
    tool_registry: Arc<ToolRegistry>,
    prompts: Arc<dyn AgentPrompts>,
    sink: SinkHandle,
}

impl AgentRunner {
    pub fn new(llm_client: Arc<dyn LlmClient>, throttle: Arc<AdaptiveThrottle>, tool_registry: Arc<ToolRegistry>, prompts: Arc<dyn AgentPrompts>, sink: SinkHandle) -> Self {
        Self { llm_client, throttle, tool_registry, prompts, sink }
    }

    /// Runs one worker node end to end: startup stagger, retry loop, and the
    /// degrade-mode fallback on final exhaustion. Returns `None` only when
    /// `degrade_mode = skip` swallows the result entirely.
    pub async fn run_worker(
        &self,
        session_id: Uuid,
        agent: AgentName,
        worker_index: usize,
        profile: &Profile,
        workflow_config: &WorkflowConfig,
        engine_config: &EngineConfig,
        requested_websearch: bool,
    ) -> Option<AgentResult> {
        let retry_policy = RetryPolicy::new(workflow_config.retry_max_attempts, workflow_config.retry_backoff_ms, workflow_config.degrade_mode.into());
        let target_id = agent.as_str().to_string();

        self.sink.send(
            session_id,
            SessionEvent::AgentStart {
                agent,
                thinking_mode: "interleaved".to_string(),
                adaptive_concurrency_limit: self.throttle.current_limit(),
                timestamp: Utc::now(),
            },
        );

        let stagger = crate::tools::throttle::startup_stagger_ms(worker_index);
        if stagger > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(stagger)).await;
        }

        let mut attempt = 1usize;
        loop {
            let started_at = Utc::now();
            let requested = requested_websearch && workflow_config.enable_websearch;
            let enable_websearch = self.tool_registry.should_enable_websearch(session_id, requested);

            match self.run_attempt(session_id, agent, profile, workflow_config, engine_config, enable_websearch).await {
                Ok((content, sources, duration_ms)) => {
                    self.throttle.record_outcome(&self.sink, session_id, true, None);
                    let content = self.prompts.postprocess(agent, content);
                    self.sink.send(
                        session_id,
                        SessionEvent::AgentEnd { agent, status: InvocationStatus::Completed, duration_ms, attempt, timestamp: Utc::now() },
                    );
                    return Some(AgentResult::completed(agent, content, sources, duration_ms));
                }
                Err(error_message) => {
                    let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;
                    self.throttle.record_outcome(&self.sink, session_id, false, Some(&error_message));

                    if retry_policy.should_retry(attempt) {
                        let backoff = retry_policy.backoff_delay(&target_id, attempt);
                        self.sink.send(
                            session_id,
                            SessionEvent::Retry {
                                target_type: TargetType::Agent,
                                target_id: target_id.clone(),
                                attempt,
                                max_attempts: retry_policy.max_attempts,
                                error: error_message.clone(),
                                backoff_ms: backoff.as_millis() as u64,
                            },
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }

                    return self.on_exhaustion(session_id, agent, workflow_config, error_message, attempt, duration_ms);
                }
            }
        }
    }

    fn on_exhaustion(
        &self,
        session_id: Uuid,
        agent: AgentName,
        workflow_config: &WorkflowConfig,
        error_message: String,
        attempt: usize,
        duration_ms: u64,
    ) -> Option<AgentResult> {
        use crate::types::DegradeMode;
        match workflow_config.degrade_mode {
            DegradeMode::Fail => {
                self.sink.send(
                    session_id,
                    SessionEvent::AgentError { agent, error: error_message.clone(), duration_ms, attempt, degrade_mode: workflow_config.degrade_mode, timestamp: Utc::now() },
                );
                self.sink.send(session_id, SessionEvent::Error { error: error_message, session_id, timestamp: Utc::now() });
                None
            }
            DegradeMode::Skip => {
                self.sink.send(
                    session_id,
                    SessionEvent::AgentEnd { agent, status: InvocationStatus::Skipped, duration_ms, attempt, timestamp: Utc::now() },
                );
                None
            }
            DegradeMode::Partial => {
                self.sink.send(
                    session_id,
                    SessionEvent::AgentError { agent, error: error_message.clone(), duration_ms, attempt, degrade_mode: workflow_config.degrade_mode, timestamp: Utc::now() },
                );
                Some(AgentResult::partial(agent, error_message, duration_ms))
            }
        }
    }

    /// One attempt: acquire a throttle slot, stream the call, emit chunk and
    /// tool events as they arrive, return the joined content + sources.
    async fn run_attempt(
        &self,
        session_id: Uuid,
        agent: AgentName,
        profile: &Profile,
        workflow_config: &WorkflowConfig,
        engine_config: &EngineConfig,
        enable_websearch: bool,
    ) -> Result<(String, Vec<NormalizedSource>, u64), String> {
        let started_at = Utc::now();
        let messages = vec![
            Message::system(self.prompts.system_prompt(agent, profile)),
            Message::user(self.prompts.user_prompt(agent, profile)),
        ];

        let call_config = CallConfig::new(workflow_config.model.clone())
            .with_websearch(enable_websearch, 5)
            .with_thinking_mode(ThinkingMode::Interleaved)
            .with_timeout(engine_config.llm_timeout);

        let _permit = self.throttle.acquire();
        let mut stream = self.llm_client.call(&messages, &call_config).await.map_err(|err| err.to_string())?;

        let mut content_parts = String::new();
        let mut sources = Vec::new();
        let mut active_invocation: Option<Uuid> = None;

        while let Some(event) = stream.next().await {
            match event {
                LlmEvent::OutputDelta { delta } => {
                    content_parts.push_str(&delta);
                    self.sink.send(session_id, SessionEvent::AgentChunk { agent, content: delta });
                }
                LlmEvent::ReasoningDelta { delta } => {
                    self.sink.send(session_id, SessionEvent::AgentThinking { agent, content: delta });
                }
                LlmEvent::SearchStart { query } => {
                    let invocation_id = self.tool_registry.begin_invocation(
                        &self.sink,
                        session_id,
                        "web_search",
                        agent,
                        &call_config.model,
                        serde_json::json!({ "query": query }),
                        Some("gather".to_string()),
                    );
                    active_invocation = Some(invocation_id);
                }
                LlmEvent::SearchComplete { sources: search_sources } => {
                    if let Some(invocation_id) = active_invocation.take() {
                        let output = serde_json::json!({
                            "sources": search_sources.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
                        });
                        self.tool_registry.end_invocation(&self.sink, invocation_id, output, search_sources.len());
                    }
                    sources.extend(search_sources);
                }
                LlmEvent::ResponseComplete(outcome) => {
                    let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;
                    if sources.is_empty() {
                        sources = outcome.sources;
                    }
                    let content = if content_parts.is_empty() { outcome.output } else { content_parts };
                    return Ok((content, sources, duration_ms));
                }
                LlmEvent::Error { message, correlation_id } => {
                    if let Some(invocation_id) = active_invocation.take() {
                        self.tool_registry.error_invocation(&self.sink, invocation_id, &message);
                    }
                    let full = match correlation_id {
                        Some(id) => format!("{message} (correlation_id={id})"),
                        None => message,
                    };
                    return Err(full);
                }
                LlmEvent::ResponseStart | LlmEvent::SearchProgress { .. } => {}
            }
        }

        Err("stream ended without a terminal event".to_string())
    }
}
