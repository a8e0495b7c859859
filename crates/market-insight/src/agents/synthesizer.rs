//! The terminal node: composes the final report from worker + debate
//! output, either via an LLM call or a deterministic fallback, then builds
//! the evidence pack, memory snapshot, and HTML rendering.

use crate::artifacts::{build_evidence_pack, build_memory_snapshot, render_html};
use crate::config::{EngineConfig, WorkflowConfig};
use crate::events::sink::SinkHandle;
use crate::events::SessionEvent;
use crate::tools::throttle::AdaptiveThrottle;
use crate::types::{AgentName, AgentResult, DebateExchange, InvocationStatus, Profile};
use chrono::Utc;
use futures::StreamExt;
use graph_engine::RetryPolicy;
use llm_client::{CallConfig, LlmClient, LlmEvent, Message, ThinkingMode};
use std::fmt::Write as _;
use std::sync::Arc;
use uuid::Uuid;

pub struct SynthesisOutcome {
    pub final_report: String,
    pub evidence_pack: serde_json::Value,
    pub memory_snapshot: serde_json::Value,
    pub report_html: String,
}

pub struct Synthesizer {
    llm_client: Option<Arc<dyn LlmClient>>,
    throttle: Arc<AdaptiveThrottle>,
    sink: SinkHandle,
}

impl Synthesizer {
    pub fn new(llm_client: Option<Arc<dyn LlmClient>>, throttle: Arc<AdaptiveThrottle>, sink: SinkHandle) -> Self {
        Self { llm_client, throttle, sink }
    }

    /// Runs the synthesizer node: composes `final_report`, derives the
    /// evidence pack and memory snapshot, renders HTML, and emits the
    /// synthesizer's own `agent_start`/`agent_end`.
    pub async fn run(
        &self,
        session_id: Uuid,
        profile: &Profile,
        agent_results: &[AgentResult],
        debate_exchanges: &[DebateExchange],
        workflow_config: &WorkflowConfig,
        engine_config: &EngineConfig,
    ) -> SynthesisOutcome {
        self.sink.send(
            session_id,
            SessionEvent::AgentStart {
                agent: AgentName::Synthesizer,
                thinking_mode: "off".to_string(),
                adaptive_concurrency_limit: self.throttle.current_limit(),
                timestamp: Utc::now(),
            },
        );
        let started_at = Utc::now();

        let has_content = agent_results.iter().any(|result| !result.content.trim().is_empty());
        let (report, status) = if let (Some(client), true) = (self.llm_client.as_ref(), has_content) {
            match self.run_llm_synthesis(session_id, client.as_ref(), agent_results, debate_exchanges, workflow_config, engine_config).await {
                Ok(report) => (report, InvocationStatus::Completed),
                Err(_) => (fallback_report(agent_results, debate_exchanges), InvocationStatus::Degraded),
            }
        } else {
            (fallback_report(agent_results, debate_exchanges), if has_content { InvocationStatus::Completed } else { InvocationStatus::Degraded })
        };

        let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;
        self.sink.send(
            session_id,
            SessionEvent::AgentEnd { agent: AgentName::Synthesizer, status, duration_ms, attempt: 1, timestamp: Utc::now() },
        );

        let generated_at = Utc::now();
        let evidence_pack = build_evidence_pack(session_id, profile, agent_results, debate_exchanges, &report, generated_at);
        let memory_snapshot = build_memory_snapshot(session_id, profile, agent_results, debate_exchanges, &report, generated_at);
        let report_html = render_html(session_id, &report);

        SynthesisOutcome { final_report: report, evidence_pack, memory_snapshot, report_html }
    }

    async fn run_llm_synthesis(
        &self,
        _session_id: Uuid,
        client: &dyn LlmClient,
        agent_results: &[AgentResult],
        debate_exchanges: &[DebateExchange],
        workflow_config: &WorkflowConfig,
        engine_config: &EngineConfig,
    ) -> Result<String, String> {
        let retry_policy = RetryPolicy::new(workflow_config.retry_max_attempts, workflow_config.retry_backoff_ms, workflow_config.degrade_mode.into());
        let prompt = synthesis_prompt(agent_results, debate_exchanges);
        let messages = vec![
            Message::system("You are the synthesizer composing the final market-insight report from the worker and debate transcripts below."),
            Message::user(prompt),
        ];
        let call_config = CallConfig::new(workflow_config.model.clone())
            .with_thinking_mode(ThinkingMode::Off)
            .with_timeout(engine_config.llm_timeout);

        let mut attempt = 1usize;
        loop {
            let _permit = self.throttle.acquire();
            match client.call(&messages, &call_config).await {
                Ok(stream) => match llm_client::collect(stream).await {
                    Ok(outcome) => return Ok(outcome.output),
                    Err(err) => {
                        if !retry_policy.should_retry(attempt) {
                            return Err(err.to_string());
                        }
                        tokio::time::sleep(retry_policy.backoff_delay("synthesizer", attempt)).await;
                        attempt += 1;
                    }
                },
                Err(err) => {
                    if !retry_policy.should_retry(attempt) {
                        return Err(err.to_string());
                    }
                    tokio::time::sleep(retry_policy.backoff_delay("synthesizer", attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn synthesis_prompt(agent_results: &[AgentResult], debate_exchanges: &[DebateExchange]) -> String {
    let mut prompt = String::new();
    for result in agent_results {
        let _ = writeln!(prompt, "## {}\n{}\n", result.agent_name.as_str(), result.content);
    }
    for exchange in debate_exchanges {
        let _ = writeln!(
            prompt,
            "### Exchange round {} ({} -> {})\nchallenge: {}\nresponse: {}\n",
            exchange.round_number,
            exchange.challenger.as_str(),
            exchange.responder.as_str(),
            exchange.challenge_content,
            exchange.response_content
        );
    }
    prompt
}

/// The deterministic composer used when no LLM agent factory is configured
/// or when zero workers produced content: one H2 section per non-empty
/// result, a collection-errors section, and a debate summary line per
/// exchange.
fn fallback_report(agent_results: &[AgentResult], debate_exchanges: &[DebateExchange]) -> String {
    let mut report = String::new();

    let mut succeeded = 0usize;
    for result in agent_results {
        if result.content.trim().is_empty() {
            continue;
        }
        succeeded += 1;
        let _ = writeln!(report, "## {}\n\n{}\n", result.agent_name.as_str(), result.content.trim());
    }

    if succeeded == 0 {
        report.push_str("No upstream output available.\n\n");
    }

    let failed: Vec<&AgentResult> = agent_results.iter().filter(|r| r.content.trim().is_empty()).collect();
    if !failed.is_empty() {
        report.push_str("## Collection Errors\n\n");
        for result in failed {
            let reason = result.error_message.as_deref().unwrap_or("no content produced");
            let _ = writeln!(report, "- {}: {}", result.agent_name.as_str(), reason);
        }
        report.push('\n');
    }

    if !debate_exchanges.is_empty() {
        report.push_str("## Debate Summary\n\n");
        for exchange in debate_exchanges {
            let _ = writeln!(
                report,
                "- Round {} ({:?}): {} challenged {}, revised={}",
                exchange.round_number, exchange.debate_type, exchange.challenger.as_str(), exchange.responder.as_str(), exchange.revised
            );
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InvocationStatus;

    fn completed(agent: AgentName, content: &str) -> AgentResult {
        AgentResult::completed(agent, content.to_string(), Vec::new(), 10)
    }

    fn failed(agent: AgentName, error: &str) -> AgentResult {
        AgentResult { status: InvocationStatus::Degraded, ..AgentResult::partial(agent, error.to_string(), 10) }
    }

    #[test]
    fn fallback_report_sections_successes_and_failures() {
        let results = vec![completed(AgentName::TrendScout, "growth is strong"), failed(AgentName::SocialSentinel, "boom")];
        let report = fallback_report(&results, &[]);
        assert!(report.contains("## trend_scout"));
        assert!(report.contains("growth is strong"));
        assert!(report.contains("## Collection Errors"));
        assert!(report.contains("social_sentinel: boom"));
    }

    #[test]
    fn fallback_report_notes_total_failure() {
        let results = vec![failed(AgentName::TrendScout, "boom")];
        let report = fallback_report(&results, &[]);
        assert!(report.contains("No upstream output available"));
    }

    #[test]
    fn fallback_report_includes_debate_summary_line_per_exchange() {
        let exchange = DebateExchange {
            round_number: 1,
            debate_type: crate::types::DebateType::PeerReview,
            challenger: AgentName::TrendScout,
            responder: AgentName::CompetitorAnalyst,
            challenge_content: "c".into(),
            response_content: "r".into(),
            followup_content: None,
            revised: true,
        };
        let report = fallback_report(&[completed(AgentName::TrendScout, "x")], std::slice::from_ref(&exchange));
        assert!(report.contains("## Debate Summary"));
        assert!(report.contains("revised=true"));
    }
}
