//! Error handling utilities: contextual wrapping and chain formatting.

mod context;

pub use context::{error_chain_length, format_error_chain, root_cause, ErrorContext};
