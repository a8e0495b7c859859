//! Persistence: the relational store is an out-of-scope external
//! collaborator per the upstream interface contract, so this module is a
//! working SQLite stand-in behind idempotent upsert/insert primitives.

pub mod connection;
pub mod error;
pub mod models;
pub mod repositories;

pub use connection::{connect, DatabasePool};
pub use error::{DbError, DbResult};
pub use repositories::{
    AgentResultRepository, DebateExchangeRepository, SessionRepository, ToolInvocationRepository, WorkflowEventRepository,
};
