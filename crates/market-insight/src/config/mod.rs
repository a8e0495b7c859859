//! Layered configuration: hardcoded defaults, overridden by an optional
//! `market-insight.toml`, overridden by `MARKET_INSIGHT_*` environment
//! variables, overridden by explicit per-session request fields.

pub mod defaults;

use crate::error::{OrchestratorError, Result};
use crate::types::DegradeMode;
use insight_tooling::config::{get_env_bool, get_env_or, get_env_parse_or, ConfigBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Per-session knobs a caller may override on the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub debate_rounds: u8,
    pub enable_followup: bool,
    pub enable_websearch: bool,
    pub retry_max_attempts: usize,
    pub retry_backoff_ms: u64,
    pub degrade_mode: DegradeMode,
    pub model: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            debate_rounds: defaults::DEBATE_ROUNDS,
            enable_followup: defaults::ENABLE_FOLLOWUP,
            enable_websearch: defaults::ENABLE_WEBSEARCH,
            retry_max_attempts: defaults::RETRY_MAX_ATTEMPTS,
            retry_backoff_ms: defaults::RETRY_BACKOFF_MS,
            degrade_mode: DegradeMode::Partial,
            model: "insight-default".to_string(),
        }
    }
}

impl ConfigBuilder for WorkflowConfig {
    fn validate(&self) -> insight_tooling::Result<()> {
        if !(0..=2).contains(&self.debate_rounds) {
            return Err(insight_tooling::ToolingError::General(format!(
                "debate_rounds must be in {{0,1,2}}, got {}",
                self.debate_rounds
            )));
        }
        if self.retry_max_attempts < 1 {
            return Err(insight_tooling::ToolingError::General(
                "retry_max_attempts must be >= 1".into(),
            ));
        }
        Ok(())
    }

    fn from_env(prefix: &str) -> insight_tooling::Result<Self> {
        let mut config = Self::default();
        config.debate_rounds = get_env_parse_or(&format!("{prefix}DEBATE_ROUNDS"), config.debate_rounds)?;
        config.enable_followup = get_env_bool(&format!("{prefix}ENABLE_FOLLOWUP"))?.unwrap_or(config.enable_followup);
        config.enable_websearch = get_env_bool(&format!("{prefix}ENABLE_WEBSEARCH"))?.unwrap_or(config.enable_websearch);
        config.retry_max_attempts =
            get_env_parse_or(&format!("{prefix}RETRY_MAX_ATTEMPTS"), config.retry_max_attempts)?;
        config.retry_backoff_ms = get_env_parse_or(&format!("{prefix}RETRY_BACKOFF_MS"), config.retry_backoff_ms)?;
        config.model = get_env_or(&format!("{prefix}MODEL"), config.model)?;
        Ok(config)
    }

    fn merge(&mut self, other: Self) -> &mut Self {
        *self = other;
        self
    }
}

impl WorkflowConfig {
    /// Re-validate `self` as the authoritative runtime policy for a single
    /// request, mapping any failure into an `OrchestratorError::Validation`
    /// never touching the graph.
    pub fn validate_for_request(&self) -> Result<()> {
        ConfigBuilder::validate(self).map_err(|e| OrchestratorError::Validation(e.to_string()))
    }
}

/// Process-wide knobs: adaptive throttle thresholds, guardrail ceilings,
/// LLM client connection knobs, per-model pricing overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub llm_timeout: Duration,
    pub llm_connect_timeout: Duration,

    pub throttle_default_width: usize,
    pub throttle_reduced_width: usize,
    pub throttle_failure_threshold: u32,
    pub throttle_recovery_streak: u32,
    pub throttle_cooldown: Duration,

    pub guardrail_max_estimated_cost_usd: f64,
    pub guardrail_max_error_rate: f64,
    pub guardrail_min_calls_for_error_rate: usize,

    pub cache_ttl: Duration,
    pub cache_max_size: usize,

    pub model_prices: HashMap<String, (f64, f64)>,
    pub default_input_price_usd_per_1k: f64,
    pub default_output_price_usd_per_1k: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            llm_timeout: defaults::LLM_TIMEOUT,
            llm_connect_timeout: defaults::LLM_CONNECT_TIMEOUT,
            throttle_default_width: defaults::THROTTLE_DEFAULT_WIDTH,
            throttle_reduced_width: defaults::THROTTLE_REDUCED_WIDTH,
            throttle_failure_threshold: defaults::THROTTLE_FAILURE_THRESHOLD,
            throttle_recovery_streak: defaults::THROTTLE_RECOVERY_STREAK,
            throttle_cooldown: defaults::THROTTLE_COOLDOWN,
            guardrail_max_estimated_cost_usd: defaults::GUARDRAIL_MAX_ESTIMATED_COST_USD,
            guardrail_max_error_rate: defaults::GUARDRAIL_MAX_ERROR_RATE,
            guardrail_min_calls_for_error_rate: defaults::GUARDRAIL_MIN_CALLS_FOR_ERROR_RATE,
            cache_ttl: Duration::from_secs(300),
            cache_max_size: 256,
            model_prices: HashMap::new(),
            default_input_price_usd_per_1k: defaults::DEFAULT_INPUT_PRICE_USD_PER_1K,
            default_output_price_usd_per_1k: defaults::DEFAULT_OUTPUT_PRICE_USD_PER_1K,
        }
    }
}

impl ConfigBuilder for EngineConfig {
    fn validate(&self) -> insight_tooling::Result<()> {
        if self.throttle_default_width == 0 {
            return Err(insight_tooling::ToolingError::General("throttle_default_width must be > 0".into()));
        }
        Ok(())
    }

    fn from_env(prefix: &str) -> insight_tooling::Result<Self> {
        let mut config = Self::default();
        config.throttle_default_width =
            get_env_parse_or(&format!("{prefix}THROTTLE_DEFAULT_WIDTH"), config.throttle_default_width)?;
        config.throttle_reduced_width =
            get_env_parse_or(&format!("{prefix}THROTTLE_REDUCED_WIDTH"), config.throttle_reduced_width)?;
        config.guardrail_max_estimated_cost_usd = get_env_parse_or(
            &format!("{prefix}GUARDRAIL_MAX_ESTIMATED_COST_USD"),
            config.guardrail_max_estimated_cost_usd,
        )?;
        Ok(config)
    }

    fn merge(&mut self, other: Self) -> &mut Self {
        *self = other;
        self
    }
}

impl EngineConfig {
    /// Per-model input/output price per 1k tokens, falling back to defaults.
    pub fn pricing_for(&self, model_name: &str) -> (f64, f64) {
        self.model_prices
            .get(model_name)
            .copied()
            .unwrap_or((self.default_input_price_usd_per_1k, self.default_output_price_usd_per_1k))
    }
}
