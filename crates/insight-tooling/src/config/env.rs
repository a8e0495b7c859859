//! Environment variable loading with parse errors surfaced as config errors.

use crate::{Result, ToolingError};
use std::env;
use std::str::FromStr;

pub fn get_env(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => {
            Err(ToolingError::General(format!("environment variable {key} contains invalid UTF-8")))
        }
    }
}

pub fn get_env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env(key)? {
        Some(val) => {
            let parsed = val
                .parse::<T>()
                .map_err(|e| ToolingError::General(format!("failed to parse {key}: {e}")))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

pub fn get_env_or(key: &str, default: impl Into<String>) -> Result<String> {
    Ok(get_env(key)?.unwrap_or_else(|| default.into()))
}

pub fn get_env_parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(get_env_parse(key)?.unwrap_or(default))
}

pub fn get_env_bool(key: &str) -> Result<Option<bool>> {
    match get_env(key)? {
        Some(val) => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(ToolingError::General(format!("invalid boolean value for {key}: {val}"))),
        },
        None => Ok(None),
    }
}

pub fn build_env_key(prefix: &str, name: &str) -> String {
    format!("{prefix}{}", name.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_var_falls_back_to_default() {
        assert_eq!(get_env_or("INSIGHT_TOOLING_TEST_MISSING", "fallback").unwrap(), "fallback");
    }

    #[test]
    fn parses_typed_values() {
        env::set_var("INSIGHT_TOOLING_TEST_NUM", "7");
        let parsed: Option<u32> = get_env_parse("INSIGHT_TOOLING_TEST_NUM").unwrap();
        assert_eq!(parsed, Some(7));
        env::remove_var("INSIGHT_TOOLING_TEST_NUM");
    }

    #[test]
    fn rejects_unparseable_bool() {
        env::set_var("INSIGHT_TOOLING_TEST_BOOL", "maybe");
        assert!(get_env_bool("INSIGHT_TOOLING_TEST_BOOL").is_err());
        env::remove_var("INSIGHT_TOOLING_TEST_BOOL");
    }

    #[test]
    fn build_env_key_uppercases_name() {
        assert_eq!(build_env_key("MARKET_INSIGHT_", "retry_max_attempts"), "MARKET_INSIGHT_RETRY_MAX_ATTEMPTS");
    }
}
