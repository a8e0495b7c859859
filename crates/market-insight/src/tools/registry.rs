//! Unified tool invocation lifecycle + guardrail hookup, grounded in
//! `original_source/backend/tools/registry.py`.

use crate::events::sink::SinkHandle;
use crate::events::{GuardrailReason, SessionEvent};
use crate::tools::cache::{self, ToolCache};
use crate::tools::guardrail::{GuardrailTripReason, ToolGuardrail};
use crate::tools::metrics::estimate_invocation_metrics;
use crate::types::AgentName;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::EngineConfig;

struct InvocationState {
    session_id: Uuid,
    tool_name: String,
    agent_name: AgentName,
    context: Option<String>,
    model_name: String,
    cache_key: String,
    cache_hit: bool,
    input_payload: Value,
    started_at: DateTime<Utc>,
}

impl InvocationState {
    /// Used when an invocation id has no matching `begin_invocation` call,
    /// e.g. after a process restart. Keeps `end`/`error` infallible.
    fn fallback() -> Self {
        Self {
            session_id: Uuid::nil(),
            tool_name: "web_search".to_string(),
            agent_name: AgentName::TrendScout,
            context: None,
            model_name: "unknown".to_string(),
            cache_key: String::new(),
            cache_hit: false,
            input_payload: Value::Object(Default::default()),
            started_at: Utc::now(),
        }
    }
}

/// Outcome of ending (successfully or not) a tool invocation: whether the
/// guardrail tripped on this call, so callers can react (disable web search,
/// degrade the invoking agent).
pub struct InvocationOutcome {
    pub invocation_id: Uuid,
    pub sources_count: usize,
    pub guardrail_triggered: bool,
}

/// Emits `tool_start` / `tool_end` / `tool_error` and drives the session's
/// [`ToolGuardrail`] after every completed or failed call. Owns the
/// process-wide `web_search` result cache, keyed off agent/model/prompt so
/// identical calls across agents and debate rounds can be served from it.
pub struct ToolRegistry {
    guardrail: Arc<ToolGuardrail>,
    engine_config: Arc<EngineConfig>,
    cache: ToolCache,
    active: Mutex<HashMap<Uuid, InvocationState>>,
}

impl ToolRegistry {
    pub fn new(guardrail: Arc<ToolGuardrail>, engine_config: Arc<EngineConfig>) -> Self {
        let cache = ToolCache::new(engine_config.cache_ttl, engine_config.cache_max_size);
        Self { guardrail, engine_config, cache, active: Mutex::new(HashMap::new()) }
    }

    pub fn should_enable_websearch(&self, session_id: Uuid, requested: bool) -> bool {
        requested && !self.guardrail.is_websearch_disabled(session_id)
    }

    /// Begins an invocation, looking up the cache under a key derived from
    /// the agent/model/prompt so the `tool_start` payload's `cache_hit` flag
    /// reflects a real lookup. `end_invocation` populates the cache on a
    /// miss.
    #[allow(clippy::too_many_arguments)]
    pub fn begin_invocation(
        &self,
        sink: &SinkHandle,
        session_id: Uuid,
        tool_name: &str,
        agent_name: AgentName,
        model_name: &str,
        input_payload: Value,
        context: Option<String>,
    ) -> Uuid {
        let started_at = Utc::now();
        let invocation_id = Uuid::new_v4();
        let cache_key = cache::build_key(agent_name.as_str(), model_name, "v1", &cache::hash_prompt(&[&input_payload.to_string()]), 0, true);
        let cache_hit = self.cache.get(&cache_key).is_some();
        let state = InvocationState {
            session_id,
            tool_name: tool_name.to_string(),
            agent_name,
            context: context.clone(),
            model_name: model_name.to_string(),
            cache_key,
            cache_hit,
            input_payload: input_payload.clone(),
            started_at,
        };
        self.active.lock().insert(invocation_id, state);

        sink.send(
            session_id,
            SessionEvent::ToolStart {
                invocation_id,
                tool: tool_name.to_string(),
                agent: agent_name,
                context,
                model_name: model_name.to_string(),
                cache_hit,
                input: input_payload,
                started_at,
                timestamp: started_at,
            },
        );
        invocation_id
    }

    pub fn end_invocation(
        &self,
        sink: &SinkHandle,
        invocation_id: Uuid,
        mut output_payload: Value,
        sources_count: usize,
    ) -> InvocationOutcome {
        let state = self.pop_or_fallback(invocation_id);
        let finished_at = Utc::now();
        let duration_ms = duration_ms_since(state.started_at, finished_at);

        if let Value::Object(map) = &mut output_payload {
            map.entry("sources_count").or_insert_with(|| Value::from(sources_count));
        }

        if !state.cache_hit {
            self.cache.set(state.cache_key.clone(), output_payload.clone());
        }

        let estimate = estimate_invocation_metrics(&state.input_payload, &output_payload, &state.model_name, &self.engine_config);

        sink.send(
            state.session_id,
            SessionEvent::ToolEnd {
                invocation_id,
                tool: state.tool_name.clone(),
                agent: state.agent_name,
                context: state.context.clone(),
                model_name: state.model_name.clone(),
                cache_hit: state.cache_hit,
                input: state.input_payload.clone(),
                output: output_payload,
                sources_count,
                duration_ms,
                started_at: state.started_at,
                finished_at,
                estimated_input_tokens: estimate.estimated_input_tokens,
                estimated_output_tokens: estimate.estimated_output_tokens,
                estimated_cost_usd: estimate.estimated_cost_usd,
                cost_mode: "estimate".to_string(),
                timestamp: finished_at,
            },
        );

        let guardrail_triggered = self.apply_guardrail(sink, state.session_id, "completed", estimate.estimated_cost_usd);

        InvocationOutcome { invocation_id, sources_count, guardrail_triggered }
    }

    pub fn error_invocation(&self, sink: &SinkHandle, invocation_id: Uuid, error_message: &str) -> InvocationOutcome {
        let state = self.pop_or_fallback(invocation_id);
        let finished_at = Utc::now();
        let duration_ms = duration_ms_since(state.started_at, finished_at);

        let mut output_payload = Value::Object(Default::default());
        if let Value::Object(map) = &mut output_payload {
            map.insert("error".to_string(), Value::from(error_message));
        }

        let estimate = estimate_invocation_metrics(&state.input_payload, &output_payload, &state.model_name, &self.engine_config);

        sink.send(
            state.session_id,
            SessionEvent::ToolError {
                invocation_id,
                tool: state.tool_name.clone(),
                agent: state.agent_name,
                context: state.context.clone(),
                model_name: state.model_name.clone(),
                cache_hit: state.cache_hit,
                input: state.input_payload.clone(),
                output: output_payload,
                error: error_message.to_string(),
                duration_ms,
                started_at: state.started_at,
                finished_at,
                estimated_input_tokens: estimate.estimated_input_tokens,
                estimated_output_tokens: estimate.estimated_output_tokens,
                estimated_cost_usd: estimate.estimated_cost_usd,
                cost_mode: "estimate".to_string(),
                timestamp: finished_at,
            },
        );

        let guardrail_triggered = self.apply_guardrail(sink, state.session_id, "error", estimate.estimated_cost_usd);

        InvocationOutcome { invocation_id, sources_count: 0, guardrail_triggered }
    }

    fn apply_guardrail(&self, sink: &SinkHandle, session_id: Uuid, status: &str, estimated_cost_usd: f64) -> bool {
        self.guardrail.record_invocation(session_id, status, estimated_cost_usd);
        let (triggered, reason, stats) = self.guardrail.evaluate(session_id);
        if !triggered || !self.guardrail.mark_triggered(session_id) {
            return false;
        }

        let reason = match reason {
            Some(GuardrailTripReason::EstimatedCostExceeded) => GuardrailReason::EstimatedCostExceeded,
            Some(GuardrailTripReason::ErrorRateExceeded) | None => GuardrailReason::ErrorRateExceeded,
        };

        sink.send(
            session_id,
            SessionEvent::GuardrailTriggered {
                session_id,
                action: self.guardrail.action.to_string(),
                reason,
                stats: serde_json::to_value(stats).unwrap_or(Value::Null),
                timestamp: Utc::now(),
            },
        );
        true
    }

    fn pop_or_fallback(&self, invocation_id: Uuid) -> InvocationState {
        self.active.lock().remove(&invocation_id).unwrap_or_else(InvocationState::fallback)
    }
}

fn duration_ms_since(started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> u64 {
    (finished_at - started_at).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use serde_json::json;

    async fn registry() -> (ToolRegistry, SinkHandle, tokio::task::JoinHandle<()>) {
        let engine_config = Arc::new(EngineConfig::default());
        let guardrail = Arc::new(ToolGuardrail::new(&engine_config));
        let registry = ToolRegistry::new(guardrail, engine_config);
        let pool = crate::db::connect("sqlite::memory:").await.unwrap();
        let (sink, handle) = crate::events::sink::spawn(pool);
        (registry, sink, handle)
    }

    #[tokio::test]
    async fn begin_then_end_reports_zero_guardrail_trip_under_ceiling() {
        let (registry, sink, _handle) = registry().await;
        let session_id = Uuid::new_v4();
        let invocation_id = registry.begin_invocation(&sink, session_id, "web_search", AgentName::TrendScout, "insight-default", json!({"query": "q"}), None);
        let outcome = registry.end_invocation(&sink, invocation_id, json!({"results": []}), 0);
        assert!(!outcome.guardrail_triggered);
    }

    #[tokio::test]
    async fn ending_an_unknown_invocation_falls_back_instead_of_panicking() {
        let (registry, sink, _handle) = registry().await;
        let outcome = registry.end_invocation(&sink, Uuid::new_v4(), json!({}), 0);
        assert_eq!(outcome.sources_count, 0);
    }

    #[tokio::test]
    async fn should_enable_websearch_respects_guardrail_disable() {
        let (registry, sink, _handle) = registry().await;
        let session_id = Uuid::new_v4();
        assert!(registry.should_enable_websearch(session_id, true));

        for _ in 0..3 {
            let invocation_id = registry.begin_invocation(&sink, session_id, "web_search", AgentName::TrendScout, "insight-default", json!({}), None);
            registry.error_invocation(&sink, invocation_id, "boom");
        }
        assert!(!registry.should_enable_websearch(session_id, true));
    }

    #[tokio::test]
    async fn repeating_an_identical_call_reports_a_cache_hit() {
        let (registry, sink, _handle) = registry().await;
        let session_id = Uuid::new_v4();
        let input = json!({"query": "handmade jewelry demand"});

        let first = registry.begin_invocation(&sink, session_id, "web_search", AgentName::TrendScout, "insight-default", input.clone(), None);
        registry.end_invocation(&sink, first, json!({"results": ["a"]}), 1);

        let second = registry.begin_invocation(&sink, session_id, "web_search", AgentName::TrendScout, "insight-default", input, None);
        assert!(registry.active.lock().get(&second).unwrap().cache_hit);
    }
}
