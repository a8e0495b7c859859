//! Layered configuration loading: defaults, environment variables, merge.

mod builder;
mod env;

pub use builder::ConfigBuilder;
pub use env::{build_env_key, get_env, get_env_bool, get_env_or, get_env_parse, get_env_parse_or};
