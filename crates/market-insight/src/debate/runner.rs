//! Debate Runner: peer-review and red-team rounds over the four worker
//! results, each exchange a strictly sequential challenge → respond →
//! (follow-up?) triple retried as a single unit.

use crate::config::WorkflowConfig;
use crate::events::sink::SinkHandle;
use crate::events::{SessionEvent, TargetType};
use crate::tools::throttle::AdaptiveThrottle;
use crate::types::{AgentName, AgentResult, DebateExchange, DebateType, DegradeMode};
use chrono::Utc;
use graph_engine::RetryPolicy;
use llm_client::{collect, CallConfig, LlmClient, Message};
use std::sync::Arc;
use uuid::Uuid;

const REVISION_MARKERS: &[&str] = &["修订", "修改"];

fn is_revised(response: &str) -> bool {
    REVISION_MARKERS.iter().any(|marker| response.contains(marker))
}

fn preview(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= limit {
        return trimmed.to_string();
    }
    let mut clipped: String = trimmed.chars().take(limit.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

/// Clearly-labeled stand-in for the out-of-scope debate prompt policy.
/// `respond_prompt` and `followup_prompt` receive a pre-clipped quote of the
/// prior content (1000 chars of the responder's original, 500 of the
/// original challenge) per the quoting convention below.
pub trait DebatePrompts: Send + Sync {
    fn challenge_prompt(&self, challenger: AgentName, responder: AgentName, responder_content: &str) -> String;
    fn respond_prompt(&self, responder: AgentName, original_content_clip: &str, challenge_content: &str) -> String;
    fn followup_prompt(&self, challenger: AgentName, original_challenge_clip: &str, response_content: &str) -> String;
}

pub struct DefaultDebatePrompts;

impl DebatePrompts for DefaultDebatePrompts {
    fn challenge_prompt(&self, challenger: AgentName, responder: AgentName, responder_content: &str) -> String {
        format!(
            "As {}, challenge the following finding from {}:\n\n{}",
            challenger.as_str(),
            responder.as_str(),
            responder_content
        )
    }

    fn respond_prompt(&self, responder: AgentName, original_content_clip: &str, challenge_content: &str) -> String {
        format!(
            "As {}, respond to this challenge, revising your finding if warranted. Your original finding was:\n\n{}\n\nChallenge:\n\n{}",
            responder.as_str(),
            original_content_clip,
            challenge_content
        )
    }

    fn followup_prompt(&self, challenger: AgentName, original_challenge_clip: &str, response_content: &str) -> String {
        format!(
            "As {}, offer a brief follow-up. Your original challenge was:\n\n{}\n\nResponse:\n\n{}",
            challenger.as_str(),
            original_challenge_clip,
            response_content
        )
    }
}

/// The fixed peer pairings run bidirectionally: four exchanges per round.
const PEER_PAIRS: [(AgentName, AgentName); 2] = [(AgentName::TrendScout, AgentName::CompetitorAnalyst), (AgentName::RegulationChecker, AgentName::SocialSentinel)];

pub struct DebateRunner {
    llm_client: Arc<dyn LlmClient>,
    throttle: Arc<AdaptiveThrottle>,
    prompts: Arc<dyn DebatePrompts>,
    sink: SinkHandle,
}

impl DebateRunner {
    pub fn new(llm_client: Arc<dyn LlmClient>, throttle: Arc<AdaptiveThrottle>, prompts: Arc<dyn DebatePrompts>, sink: SinkHandle) -> Self {
        Self { llm_client, throttle, prompts, sink }
    }

    pub async fn run_peer_round(
        &self,
        session_id: Uuid,
        round_number: u8,
        agent_results: &[AgentResult],
        workflow_config: &WorkflowConfig,
    ) -> Result<Vec<DebateExchange>, String> {
        self.sink.send(session_id, SessionEvent::DebateRoundStart { round_number, debate_type: DebateType::PeerReview, timestamp: Utc::now() });

        let mut exchanges = Vec::new();
        for (a, b) in PEER_PAIRS {
            if let Some(exchange) = self.run_exchange(session_id, round_number, DebateType::PeerReview, a, b, agent_results, workflow_config).await? {
                exchanges.push(exchange);
            }
            if let Some(exchange) = self.run_exchange(session_id, round_number, DebateType::PeerReview, b, a, agent_results, workflow_config).await? {
                exchanges.push(exchange);
            }
        }

        self.sink.send(
            session_id,
            SessionEvent::DebateRoundEnd { round_number, debate_type: DebateType::PeerReview, exchanges_count: exchanges.len(), timestamp: Utc::now() },
        );
        Ok(exchanges)
    }

    pub async fn run_redteam_round(
        &self,
        session_id: Uuid,
        round_number: u8,
        agent_results: &[AgentResult],
        workflow_config: &WorkflowConfig,
    ) -> Result<Vec<DebateExchange>, String> {
        self.sink.send(session_id, SessionEvent::DebateRoundStart { round_number, debate_type: DebateType::RedTeam, timestamp: Utc::now() });

        let mut exchanges = Vec::new();
        for worker in AgentName::workers() {
            if let Some(exchange) = self
                .run_exchange(session_id, round_number, DebateType::RedTeam, AgentName::DebateChallenger, worker, agent_results, workflow_config)
                .await?
            {
                exchanges.push(exchange);
            }
        }

        self.sink.send(
            session_id,
            SessionEvent::DebateRoundEnd { round_number, debate_type: DebateType::RedTeam, exchanges_count: exchanges.len(), timestamp: Utc::now() },
        );
        Ok(exchanges)
    }

    /// One challenge → respond → (follow-up?) exchange, retried as a whole
    /// on failure. Returns `Ok(None)` when `degrade_mode = skip` drops it,
    /// `Err` when `degrade_mode = fail` should abort the session.
    async fn run_exchange(
        &self,
        session_id: Uuid,
        round_number: u8,
        debate_type: DebateType,
        challenger: AgentName,
        responder: AgentName,
        agent_results: &[AgentResult],
        workflow_config: &WorkflowConfig,
    ) -> Result<Option<DebateExchange>, String> {
        let retry_policy = RetryPolicy::new(workflow_config.retry_max_attempts, workflow_config.retry_backoff_ms, workflow_config.degrade_mode.into());
        let target_id = format!("r{round_number}:{}->{}", challenger.as_str(), responder.as_str());

        let responder_content = agent_results.iter().find(|r| r.agent_name == responder).map(|r| r.content.as_str()).unwrap_or_default();

        let mut attempt = 1usize;
        loop {
            match self.attempt_exchange(session_id, round_number, debate_type, challenger, responder, responder_content, workflow_config, attempt).await {
                Ok(exchange) => return Ok(Some(exchange)),
                Err(error_message) => {
                    if retry_policy.should_retry(attempt) {
                        let backoff = retry_policy.backoff_delay(&target_id, attempt);
                        self.sink.send(
                            session_id,
                            SessionEvent::Retry {
                                target_type: TargetType::DebateExchange,
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

                    return match workflow_config.degrade_mode {
                        DegradeMode::Skip => Ok(None),
                        DegradeMode::Partial => Ok(Some(DebateExchange {
                            round_number,
                            debate_type,
                            challenger,
                            responder,
                            challenge_content: String::new(),
                            response_content: String::new(),
                            followup_content: Some(error_message),
                            revised: false,
                        })),
                        DegradeMode::Fail => Err(error_message),
                    };
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt_exchange(
        &self,
        session_id: Uuid,
        round_number: u8,
        debate_type: DebateType,
        challenger: AgentName,
        responder: AgentName,
        responder_content: &str,
        workflow_config: &WorkflowConfig,
        attempt: usize,
    ) -> Result<DebateExchange, String> {
        self.sink.send(session_id, SessionEvent::AgentChallenge { round_number, from_agent: challenger, to_agent: responder, attempt });
        let challenge_content = self.call(&self.prompts.challenge_prompt(challenger, responder, responder_content), workflow_config, session_id).await?;
        self.sink.send(
            session_id,
            SessionEvent::AgentChallengeEnd {
                round_number,
                from_agent: challenger,
                to_agent: responder,
                challenge_content: challenge_content.clone(),
                content_preview: preview(&challenge_content, 200),
                attempt,
            },
        );

        self.sink.send(session_id, SessionEvent::AgentRespond { round_number, from_agent: responder, to_agent: challenger, attempt });
        let original_content_clip = preview(responder_content, 1000);
        let response_content =
            self.call(&self.prompts.respond_prompt(responder, &original_content_clip, &challenge_content), workflow_config, session_id).await?;
        let revised = is_revised(&response_content);
        self.sink.send(
            session_id,
            SessionEvent::AgentRespondEnd {
                round_number,
                from_agent: responder,
                to_agent: challenger,
                response_content: response_content.clone(),
                revised,
                content_preview: preview(&response_content, 200),
                attempt,
            },
        );

        let followup_content = if workflow_config.enable_followup {
            self.sink.send(session_id, SessionEvent::AgentFollowup { round_number, from_agent: challenger, to_agent: responder });
            let original_challenge_clip = preview(&challenge_content, 500);
            let followup =
                self.call(&self.prompts.followup_prompt(challenger, &original_challenge_clip, &response_content), workflow_config, session_id).await?;
            self.sink.send(
                session_id,
                SessionEvent::AgentFollowupEnd {
                    round_number,
                    from_agent: challenger,
                    to_agent: responder,
                    followup_content: followup.clone(),
                    content_preview: preview(&followup, 200),
                },
            );
            Some(followup)
        } else {
            None
        };

        Ok(DebateExchange { round_number, debate_type, challenger, responder, challenge_content, response_content, followup_content, revised })
    }

    async fn call(&self, prompt: &str, workflow_config: &WorkflowConfig, session_id: Uuid) -> Result<String, String> {
        let messages = vec![Message::user(prompt)];
        let call_config = CallConfig::new(workflow_config.model.clone());

        let _permit = self.throttle.acquire();
        let stream = self.llm_client.call(&messages, &call_config).await.map_err(|err| err.to_string())?;
        match collect(stream).await {
            Ok(outcome) => {
                self.throttle.record_outcome(&self.sink, session_id, true, None);
                Ok(outcome.output)
            }
            Err(err) => {
                let message = err.to_string();
                self.throttle.record_outcome(&self.sink, session_id, false, Some(&message));
                Err(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_markers_detect_either_chinese_term() {
        assert!(is_revised("这是修订版本"));
        assert!(is_revised("已修改结论"));
        assert!(!is_revised("no change needed"));
    }

    #[test]
    fn preview_clips_to_limit_with_ellipsis() {
        let clipped = preview(&"x".repeat(200), 160);
        assert_eq!(clipped.chars().count(), 160);
        assert!(clipped.ends_with('…'));
    }
}
