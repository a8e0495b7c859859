//! Tool calling plumbing: registry lifecycle, guardrail, TTL/LRU cache,
//! token/cost metrics, and the adaptive concurrency throttle.

pub mod cache;
pub mod guardrail;
pub mod metrics;
pub mod registry;
pub mod throttle;

pub use cache::ToolCache;
pub use guardrail::ToolGuardrail;
pub use registry::ToolRegistry;
pub use throttle::AdaptiveThrottle;
