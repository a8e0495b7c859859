//! Consistent default/validate/merge API for configuration structures.

use crate::Result;

/// Implemented by every layered configuration struct (`WorkflowConfig`,
/// `EngineConfig`) to give them a uniform defaults -> env -> merge ->
/// validate pipeline.
pub trait ConfigBuilder: Default + Clone {
    /// Reject structurally invalid values before a session starts.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Load from `{prefix}{FIELD}` environment variables.
    fn from_env(prefix: &str) -> Result<Self>;

    /// Apply `other` on top of `self`, returning `self` for chaining.
    fn merge(&mut self, other: Self) -> &mut Self;

    fn build() -> Result<Self> {
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    fn from_env_with_defaults(prefix: &str) -> Result<Self> {
        let mut config = Self::from_env(prefix)?;
        config.merge(Self::default());
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolingError;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct TestConfig {
        value: Option<i32>,
    }

    impl ConfigBuilder for TestConfig {
        fn validate(&self) -> Result<()> {
            if let Some(v) = self.value {
                if v < 0 {
                    return Err(ToolingError::General("value must be non-negative".into()));
                }
            }
            Ok(())
        }

        fn from_env(_prefix: &str) -> Result<Self> {
            Ok(Self { value: Some(42) })
        }

        fn merge(&mut self, other: Self) -> &mut Self {
            if other.value.is_some() {
                self.value = other.value;
            }
            self
        }
    }

    #[test]
    fn validate_rejects_negative() {
        assert!(TestConfig { value: Some(-1) }.validate().is_err());
    }

    #[test]
    fn from_env_with_defaults_prefers_env_value() {
        let config = TestConfig::from_env_with_defaults("TEST_").unwrap();
        assert_eq!(config.value, Some(42));
    }
}
