//! End-to-end session scenarios driven entirely through `run_session`'s
//! event stream, using `FakeLlmClient` in place of a real provider.

use futures::StreamExt;
use llm_client::{FakeLlmClient, ScriptedReply};
use market_insight::config::{EngineConfig, WorkflowConfig};
use market_insight::events::SessionEvent;
use market_insight::types::{DegradeMode, Profile};
use market_insight::OrchestratorConfig;
use std::sync::Arc;

async fn run(profile: Profile, workflow: WorkflowConfig, llm_client: FakeLlmClient) -> Vec<SessionEvent> {
    let db = market_insight::db::connect("sqlite::memory:").await.unwrap();
    let mut config = OrchestratorConfig::new(Arc::new(llm_client), db);
    config.workflow = workflow;
    market_insight::run_session(profile, config).collect().await
}

fn demo_profile() -> Profile {
    Profile {
        target_market: Some("handmade jewelry".to_string()),
        supply_chain: Some("domestic".to_string()),
        seller_type: Some("individual".to_string()),
        min_price: Some(10.0),
        max_price: Some(200.0),
        extra: Default::default(),
    }
}

fn scripted_success() -> FakeLlmClient {
    FakeLlmClient::new(vec![
        ScriptedReply::text("demand is trending upward"),
        ScriptedReply::text("three incumbents dominate the category"),
        ScriptedReply::text("no blocking regulation found"),
        ScriptedReply::text("sentiment skews positive"),
    ])
}

fn debate_exchange_count(events: &[SessionEvent]) -> usize {
    events.iter().filter(|e| matches!(e, SessionEvent::AgentRespondEnd { .. })).count()
}

fn final_event<'a>(events: &'a [SessionEvent]) -> &'a SessionEvent {
    events.last().expect("session produced no events")
}

// S1: happy path, no debate.
#[tokio::test]
async fn happy_path_with_no_debate_rounds_skips_debate_entirely() {
    let workflow = WorkflowConfig { debate_rounds: 0, retry_backoff_ms: 1, ..WorkflowConfig::default() };
    let events = run(demo_profile(), workflow, scripted_success()).await;

    assert!(events.iter().any(|e| matches!(e, SessionEvent::OrchestratorStart { .. })));
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::DebateRoundStart { .. })));
    assert_eq!(debate_exchange_count(&events), 0);

    let gather_complete = events.iter().find_map(|e| match e {
        SessionEvent::GatherComplete { total_results, .. } => Some(*total_results),
        _ => None,
    });
    assert_eq!(gather_complete, Some(4));

    assert!(matches!(final_event(&events), SessionEvent::OrchestratorEnd { .. }));
}

// S2: peer-review round only.
#[tokio::test]
async fn debate_rounds_one_runs_peer_review_only_with_four_exchanges() {
    let workflow = WorkflowConfig { debate_rounds: 1, retry_backoff_ms: 1, ..WorkflowConfig::default() };
    let events = run(demo_profile(), workflow, scripted_success()).await;

    let round_starts: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::DebateRoundStart { round_number, debate_type, .. } => Some((*round_number, *debate_type)),
            _ => None,
        })
        .collect();
    assert_eq!(round_starts.len(), 1);
    assert_eq!(round_starts[0].0, 1);

    assert_eq!(debate_exchange_count(&events), 4);
    assert!(matches!(final_event(&events), SessionEvent::OrchestratorEnd { .. }));
}

// S3: full peer + red-team debate.
#[tokio::test]
async fn debate_rounds_two_runs_peer_then_redteam_with_eight_exchanges() {
    let workflow = WorkflowConfig { debate_rounds: 2, retry_backoff_ms: 1, ..WorkflowConfig::default() };
    let events = run(demo_profile(), workflow, scripted_success()).await;

    let round_starts: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::DebateRoundStart { round_number, .. } => Some(*round_number),
            _ => None,
        })
        .collect();
    assert_eq!(round_starts, vec![1, 2]);

    assert_eq!(debate_exchange_count(&events), 8);
    assert!(matches!(final_event(&events), SessionEvent::OrchestratorEnd { .. }));
}

// S4a: retry exhaustion under degrade_mode=partial keeps the session alive,
// with every worker downgraded to a degraded result.
#[tokio::test]
async fn retry_exhaustion_under_partial_degrade_completes_with_degraded_agents() {
    let workflow = WorkflowConfig {
        debate_rounds: 0,
        retry_max_attempts: 2,
        retry_backoff_ms: 1,
        degrade_mode: DegradeMode::Partial,
        ..WorkflowConfig::default()
    };
    let always_fails = FakeLlmClient::single(ScriptedReply::failing("upstream unavailable"));
    let events = run(demo_profile(), workflow, always_fails).await;

    let retries = events.iter().filter(|e| matches!(e, SessionEvent::Retry { .. })).count();
    assert_eq!(retries, 4, "one retry per worker before exhaustion");

    let agent_errors = events.iter().filter(|e| matches!(e, SessionEvent::AgentError { .. })).count();
    assert_eq!(agent_errors, 4);

    assert!(matches!(final_event(&events), SessionEvent::OrchestratorEnd { .. }));
}

// S4b: retry exhaustion under degrade_mode=fail aborts the session.
#[tokio::test]
async fn retry_exhaustion_under_fail_degrade_aborts_the_session() {
    let workflow = WorkflowConfig {
        debate_rounds: 1,
        retry_max_attempts: 1,
        retry_backoff_ms: 1,
        degrade_mode: DegradeMode::Fail,
        ..WorkflowConfig::default()
    };
    let always_fails = FakeLlmClient::single(ScriptedReply::failing("upstream unavailable"));
    let events = run(demo_profile(), workflow, always_fails).await;

    assert!(!events.iter().any(|e| matches!(e, SessionEvent::DebateRoundStart { .. })), "abort must happen before debate starts");
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::OrchestratorEnd { .. })));
    assert!(events.iter().any(|e| matches!(e, SessionEvent::Error { .. })));
}

// S5: guardrail trips once the session's estimated cost ceiling is exceeded,
// and is idempotent thereafter. Driven directly against `ToolGuardrail`
// rather than through a full session, since reaching the dollar ceiling via
// the token-estimate heuristic would require an unwieldy amount of scripted
// content.
#[test]
fn guardrail_trips_once_cost_ceiling_exceeded_and_disables_websearch() {
    use market_insight::tools::guardrail::GuardrailTripReason;
    use market_insight::tools::ToolGuardrail;

    let mut engine = EngineConfig::default();
    engine.guardrail_max_estimated_cost_usd = 0.50;
    let guardrail = ToolGuardrail::new(&engine);
    let session_id = uuid::Uuid::new_v4();

    guardrail.record_invocation(session_id, "completed", 0.30);
    assert!(!guardrail.evaluate(session_id).0, "under ceiling so far");
    assert!(!guardrail.is_websearch_disabled(session_id));

    guardrail.record_invocation(session_id, "completed", 0.30);
    let (triggered, reason, _) = guardrail.evaluate(session_id);
    assert!(triggered);
    assert_eq!(reason, Some(GuardrailTripReason::EstimatedCostExceeded));
    assert!(guardrail.is_websearch_disabled(session_id));

    assert!(guardrail.mark_triggered(session_id), "first trigger for this session");
    assert!(!guardrail.mark_triggered(session_id), "guardrail trip event fires at most once per session");
}

// S6: adaptive throttle narrows the concurrency width after consecutive
// connection-like failures, and holds it narrow until the cooldown elapses
// even if a recovery streak is reached early.
#[tokio::test]
async fn adaptive_throttle_narrows_on_failures_and_holds_through_cooldown() {
    use market_insight::tools::AdaptiveThrottle;

    let pool = market_insight::db::connect("sqlite::memory:").await.unwrap();
    let (sink, _join) = market_insight::events::sink::spawn(pool);
    let session_id = uuid::Uuid::new_v4();
    sink.register_session(session_id, true);

    let throttle = AdaptiveThrottle::new(&EngineConfig::default());
    let default_width = throttle.current_limit();

    for _ in 0..4 {
        throttle.record_outcome(&sink, session_id, false, Some("connection timed out"));
    }
    assert!(throttle.current_limit() < default_width, "width should shrink after repeated connection-like failures");

    let reduced_width = throttle.current_limit();
    for _ in 0..8 {
        throttle.record_outcome(&sink, session_id, true, None);
    }
    assert_eq!(throttle.current_limit(), reduced_width, "cooldown has not elapsed so the width must not recover yet");
}

// S6b: once the cooldown has elapsed, a recovery streak restores the
// default width and emits `adaptive_concurrency{mode:"recovered"}`.
#[tokio::test]
async fn adaptive_throttle_recovers_after_cooldown_elapses_and_emits_recovered_event() {
    use market_insight::tools::AdaptiveThrottle;
    use market_insight::events::ThrottleMode;
    use std::time::Duration;

    let pool = market_insight::db::connect("sqlite::memory:").await.unwrap();
    let (sink, external, _join) = market_insight::events::sink::spawn_with_external(pool);
    let mut external = external;
    let session_id = uuid::Uuid::new_v4();
    sink.register_session(session_id, true);

    let mut engine = EngineConfig::default();
    engine.throttle_cooldown = Duration::from_millis(1);
    let throttle = AdaptiveThrottle::new(&engine);
    let default_width = throttle.current_limit();

    for _ in 0..4 {
        throttle.record_outcome(&sink, session_id, false, Some("connection timed out"));
    }
    assert!(throttle.current_limit() < default_width);

    tokio::time::sleep(Duration::from_millis(5)).await;

    for _ in 0..6 {
        throttle.record_outcome(&sink, session_id, true, None);
    }
    assert_eq!(throttle.current_limit(), default_width, "width should recover once the cooldown has elapsed");

    let mut recovered = false;
    while let Ok(Some(envelope)) = tokio::time::timeout(Duration::from_millis(50), external.recv()).await {
        if matches!(envelope.event, SessionEvent::AdaptiveConcurrency { mode: ThrottleMode::Recovered, .. }) {
            recovered = true;
            break;
        }
    }
    assert!(recovered, "expected an adaptive_concurrency recovered event");
}

// Cross-scenario invariant: a completed session never reports more than the
// four research workers, and debate_exchanges only ever lands on one of the
// three structurally valid counts.
#[tokio::test]
async fn gather_complete_never_exceeds_four_workers() {
    for debate_rounds in [0u8, 1, 2] {
        let workflow = WorkflowConfig { debate_rounds, retry_backoff_ms: 1, ..WorkflowConfig::default() };
        let events = run(demo_profile(), workflow, scripted_success()).await;

        let total_results = events
            .iter()
            .find_map(|e| match e {
                SessionEvent::GatherComplete { total_results, .. } => Some(*total_results),
                _ => None,
            })
            .unwrap();
        assert!(total_results <= 4);

        let exchanges = debate_exchange_count(&events);
        assert!(matches!(exchanges, 0 | 4 | 8), "unexpected exchange count {exchanges} for debate_rounds={debate_rounds}");
    }
}
