//! Deterministic evidence-pack projection of agent outputs + debate
//! exchanges, grounded in `original_source/backend/core/evidence_pack.py`.

use crate::types::{AgentResult, DebateExchange, Profile};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

fn clip(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= limit {
        return trimmed.to_string();
    }
    let mut clipped: String = trimmed.chars().take(limit.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

fn normalize_confidence(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.6;
    }
    (value.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}

struct SourceIndex {
    rows: Vec<Value>,
    ids: HashMap<String, String>,
}

fn build_source_index(agent_results: &[AgentResult]) -> SourceIndex {
    let mut rows = Vec::new();
    let mut ids = HashMap::new();

    for result in agent_results {
        for source in &result.sources {
            let value = source.as_str().to_string();
            if ids.contains_key(&value) {
                continue;
            }
            let source_id = format!("S{:03}", rows.len() + 1);
            ids.insert(value.clone(), source_id.clone());
            rows.push(json!({
                "source_id": source_id,
                "source": value,
                "first_seen_in_agent": result.agent_name.as_str(),
            }));
        }
    }

    SourceIndex { rows, ids }
}

/// Builds the `phase3.v1` evidence pack: a global source index, one claim
/// per agent result, per-claim traceability, and a debate-adjustments
/// summary. Pure and infallible — degraded sessions still get a pack.
pub fn build_evidence_pack(
    session_id: Uuid,
    profile: &Profile,
    agent_results: &[AgentResult],
    debate_exchanges: &[DebateExchange],
    final_report: &str,
    generated_at: DateTime<Utc>,
) -> Value {
    let source_index = build_source_index(agent_results);

    let mut claims = Vec::new();
    let mut traceability = Vec::new();

    for (idx, result) in agent_results.iter().enumerate() {
        let claim_id = format!("C{:03}", idx + 1);
        let source_refs: Vec<&str> = result
            .sources
            .iter()
            .filter_map(|source| source_index.ids.get(source.as_str()).map(String::as_str))
            .collect();

        claims.push(json!({
            "claim_id": claim_id,
            "agent": result.agent_name.as_str(),
            "summary": clip(&result.content, 240),
            "confidence": normalize_confidence(result.confidence),
            "source_refs": source_refs,
            "generated_at": generated_at,
        }));
        traceability.push(json!({
            "claim_id": claim_id,
            "from_agent": result.agent_name.as_str(),
            "source_refs": source_refs,
        }));
    }

    let debate_adjustments: Vec<Value> = debate_exchanges
        .iter()
        .map(|exchange| {
            json!({
                "round_number": exchange.round_number,
                "debate_type": exchange.debate_type,
                "challenger": exchange.challenger.as_str(),
                "responder": exchange.responder.as_str(),
                "revised": exchange.revised,
                "challenge_summary": clip(&exchange.challenge_content, 140),
                "response_summary": clip(&exchange.response_content, 140),
            })
        })
        .collect();

    json!({
        "version": "phase3.v1",
        "session_id": session_id,
        "generated_at": generated_at,
        "profile": {
            "target_market": profile.target_market,
            "supply_chain": profile.supply_chain,
            "seller_type": profile.seller_type,
            "min_price": profile.min_price,
            "max_price": profile.max_price,
        },
        "report_excerpt": clip(final_report, 300),
        "claims": claims,
        "sources": source_index.rows,
        "debate_adjustments": debate_adjustments,
        "traceability": traceability,
        "stats": {
            "claims_count": claims_len(&claims),
            "sources_count": source_index.rows.len(),
            "debate_count": debate_adjustments.len(),
        },
    })
}

fn claims_len(claims: &[Value]) -> usize {
    claims.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentName, DebateType, InvocationStatus};
    use llm_client::normalize;

    fn result_with_sources(agent: AgentName, content: &str, raw_sources: &[&str]) -> AgentResult {
        AgentResult {
            agent_name: agent,
            content: content.to_string(),
            thinking: None,
            sources: raw_sources.iter().filter_map(|s| normalize(s)).collect(),
            confidence: 0.8,
            duration_ms: 100,
            error_message: None,
            status: InvocationStatus::Completed,
        }
    }

    #[test]
    fn assigns_source_ids_in_first_seen_order_across_agents() {
        let results = vec![
            result_with_sources(AgentName::TrendScout, "a", &["https://example.com/a", "https://example.com/b"]),
            result_with_sources(AgentName::CompetitorAnalyst, "b", &["https://example.com/b", "https://example.com/c"]),
        ];
        let pack = build_evidence_pack(Uuid::new_v4(), &Profile::default(), &results, &[], "report", Utc::now());
        let sources = pack["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0]["source_id"], "S001");
        assert_eq!(sources[1]["source_id"], "S002");
        assert_eq!(sources[2]["source_id"], "S003");
    }

    #[test]
    fn claim_ids_follow_agent_result_order() {
        let results = vec![
            result_with_sources(AgentName::TrendScout, "a", &[]),
            result_with_sources(AgentName::CompetitorAnalyst, "b", &[]),
        ];
        let pack = build_evidence_pack(Uuid::new_v4(), &Profile::default(), &results, &[], "report", Utc::now());
        let claims = pack["claims"].as_array().unwrap();
        assert_eq!(claims[0]["claim_id"], "C001");
        assert_eq!(claims[1]["claim_id"], "C002");
    }

    #[test]
    fn confidence_is_clamped_and_rounded() {
        let mut result = result_with_sources(AgentName::TrendScout, "a", &[]);
        result.confidence = 1.23456;
        let pack = build_evidence_pack(Uuid::new_v4(), &Profile::default(), &[result], &[], "report", Utc::now());
        assert_eq!(pack["claims"][0]["confidence"], 1.0);
    }

    #[test]
    fn debate_adjustments_are_clipped_and_counted() {
        let exchange = DebateExchange {
            round_number: 1,
            debate_type: DebateType::PeerReview,
            challenger: AgentName::TrendScout,
            responder: AgentName::CompetitorAnalyst,
            challenge_content: "x".repeat(200),
            response_content: "y".repeat(200),
            followup_content: None,
            revised: true,
        };
        let pack = build_evidence_pack(Uuid::new_v4(), &Profile::default(), &[], &[exchange], "report", Utc::now());
        assert_eq!(pack["stats"]["debate_count"], 1);
        assert_eq!(pack["debate_adjustments"][0]["challenge_summary"].as_str().unwrap().chars().count(), 140);
    }
}
