//! Peer-review and red-team debate rounds over worker results.

pub mod runner;

pub use runner::{DebatePrompts, DebateRunner, DefaultDebatePrompts};
