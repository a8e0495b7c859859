//! Lightweight per-session memory snapshot, grounded in
//! `original_source/backend/memory/session_snapshot.py`.

use crate::types::{AgentResult, DebateExchange, Profile};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::LazyLock;
use uuid::Uuid;

static KEYWORD_SEPARATOR: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"[，。；、,.\s/|\-_:：()\[\]{}]+").unwrap());
static LIST_MARKER: LazyLock<regex::Regex> = LazyLock::new(|| regex::Regex::new(r"^\s*(?:[-*+]|\d+\.)\s+(.+)$").unwrap());

const RISK_MARKERS: &[&str] = &["风险", "risk", "合规", "限制", "约束", "挑战"];

fn clip(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= limit {
        return trimmed.to_string();
    }
    let mut clipped: String = trimmed.chars().take(limit.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

fn extract_keywords(content: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut keywords = Vec::new();
    for token in KEYWORD_SEPARATOR.split(content) {
        let token = token.trim();
        if token.chars().count() < 3 {
            continue;
        }
        if !seen.insert(token.to_string()) {
            continue;
        }
        keywords.push(token.to_string());
        if keywords.len() >= 5 {
            break;
        }
    }
    keywords
}

fn extract_markdown_items(markdown: &str, limit: usize) -> Vec<String> {
    let mut items = Vec::new();
    for line in markdown.lines() {
        let Some(captures) = LIST_MARKER.captures(line.trim_end()) else { continue };
        let value = clip(&captures[1], 120);
        if !value.is_empty() {
            items.push(value);
        }
        if items.len() >= limit {
            break;
        }
    }
    items
}

/// Builds the `phase3.memory.v1` snapshot: entities, a clipped summary,
/// per-agent highlights with heuristic keywords, debate focus, signal
/// counts, and action/risk items lifted from the final report's Markdown.
pub fn build_memory_snapshot(
    session_id: Uuid,
    profile: &Profile,
    agent_results: &[AgentResult],
    debate_exchanges: &[DebateExchange],
    final_report: &str,
    generated_at: DateTime<Utc>,
) -> Value {
    let agent_highlights: Vec<Value> = agent_results
        .iter()
        .map(|result| {
            json!({
                "agent_name": result.agent_name.as_str(),
                "status": result.status,
                "confidence": result.confidence,
                "summary": clip(&result.content, 180),
                "keywords": extract_keywords(&result.content),
            })
        })
        .collect();

    let revised_count = debate_exchanges.iter().filter(|exchange| exchange.revised).count();
    let debate_focus: Vec<Value> = debate_exchanges
        .iter()
        .map(|exchange| {
            json!({
                "round_number": exchange.round_number,
                "debate_type": exchange.debate_type,
                "challenger": exchange.challenger.as_str(),
                "responder": exchange.responder.as_str(),
                "revised": exchange.revised,
            })
        })
        .collect();

    let action_items = extract_markdown_items(final_report, 6);
    let risk_items: Vec<String> = action_items
        .iter()
        .filter(|item| {
            let lower = item.to_lowercase();
            RISK_MARKERS.iter().any(|marker| lower.contains(marker))
        })
        .take(4)
        .cloned()
        .collect();

    json!({
        "version": "phase3.memory.v1",
        "session_id": session_id,
        "generated_at": generated_at,
        "entities": {
            "target_market": profile.target_market,
            "supply_chain": profile.supply_chain,
            "seller_type": profile.seller_type,
            "price_range": {
                "min_price": profile.min_price,
                "max_price": profile.max_price,
            },
        },
        "summary": clip(final_report, 260),
        "agent_highlights": agent_highlights,
        "debate_focus": debate_focus,
        "signals": {
            "debate_count": debate_exchanges.len(),
            "revised_count": revised_count,
            "agent_count": agent_results.len(),
        },
        "action_items": action_items,
        "risk_items": risk_items,
    })
}
