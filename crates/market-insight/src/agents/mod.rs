//! Agent Runner and Synthesizer: the two node kinds that call out to an LLM.

pub mod runner;
pub mod synthesizer;

pub use runner::{AgentPrompts, AgentRunner, DefaultAgentPrompts};
pub use synthesizer::{SynthesisOutcome, Synthesizer};
