//! Tool-invocation token/cost estimation, grounded in
//! `original_source/backend/tools/metrics.py`.

use crate::config::EngineConfig;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static ASCII_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z0-9_]+").unwrap());
static CJK_CHAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\u{4e00}-\u{9fff}]").unwrap());
static PUNCT_CHAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s\u{4e00}-\u{9fff}]").unwrap());

fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Heuristic token estimate for a mixed CJK/ASCII payload: `1.3` per ASCII
/// word, `1.5` per CJK character, `0.3` per punctuation character, floored
/// at 1 if there's any content at all.
pub fn estimate_tokens(value: &Value) -> u64 {
    let text = to_text(value);
    if text.is_empty() {
        return 0;
    }

    let ascii_words = ASCII_WORD.find_iter(&text).count() as f64;
    let cjk_chars = CJK_CHAR.find_iter(&text).count() as f64;
    let punct_chars = PUNCT_CHAR.find_iter(&text).count() as f64;

    let estimate = ascii_words * 1.3 + cjk_chars * 1.5 + punct_chars * 0.3;
    if estimate <= 0.0 {
        1
    } else {
        estimate.round() as u64
    }
}

/// Rounds half away from zero to 6 decimals (equivalent to Python's
/// `Decimal(...).quantize(..., ROUND_HALF_UP)` for non-negative inputs).
fn round_half_up_6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

pub fn estimate_cost_usd(model_name: &str, engine_config: &EngineConfig, estimated_input_tokens: u64, estimated_output_tokens: u64) -> f64 {
    let (input_price, output_price) = engine_config.pricing_for(model_name);
    let cost = (estimated_input_tokens as f64 / 1000.0) * input_price + (estimated_output_tokens as f64 / 1000.0) * output_price;
    round_half_up_6(cost)
}

pub struct InvocationMetrics {
    pub estimated_input_tokens: u64,
    pub estimated_output_tokens: u64,
    pub estimated_cost_usd: f64,
}

pub fn estimate_invocation_metrics(input: &Value, output: &Value, model_name: &str, engine_config: &EngineConfig) -> InvocationMetrics {
    let estimated_input_tokens = estimate_tokens(input);
    let estimated_output_tokens = estimate_tokens(output);
    let estimated_cost_usd = estimate_cost_usd(model_name, engine_config, estimated_input_tokens, estimated_output_tokens);
    InvocationMetrics { estimated_input_tokens, estimated_output_tokens, estimated_cost_usd }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_payload_estimates_zero_tokens() {
        assert_eq!(estimate_tokens(&Value::Null), 0);
    }

    #[test]
    fn non_empty_payload_estimates_at_least_one_token() {
        assert!(estimate_tokens(&json!(".")) >= 1);
    }

    #[test]
    fn mixed_cjk_ascii_payload_weights_each_class() {
        let tokens = estimate_tokens(&json!("hello 世界!"));
        // 1 ascii word (1.3) + 2 cjk chars (3.0) + 1 punct (0.3) = 4.6 -> rounds to 5
        assert_eq!(tokens, 5);
    }

    #[test]
    fn cost_rounds_half_up_to_six_decimals() {
        let config = EngineConfig::default();
        let cost = estimate_cost_usd("insight-default", &config, 1000, 1000);
        assert_eq!(cost, config.default_input_price_usd_per_1k + config.default_output_price_usd_per_1k);
    }

    #[test]
    fn per_model_price_override_is_used() {
        let mut config = EngineConfig::default();
        config.model_prices.insert("premium".to_string(), (0.01, 0.02));
        let cost = estimate_cost_usd("premium", &config, 1000, 1000);
        assert_eq!(cost, 0.03);
    }
}
