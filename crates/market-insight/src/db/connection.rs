//! SQLite pool construction with embedded schema creation — the store is an
//! out-of-scope external collaborator here, so this is a working stand-in
//! rather than a migration-managed production database.

use super::error::DbResult;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub type DatabasePool = SqlitePool;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY NOT NULL,
    profile TEXT NOT NULL,
    target_market TEXT,
    supply_chain TEXT,
    seller_type TEXT,
    min_price REAL,
    max_price REAL,
    debate_rounds INTEGER NOT NULL,
    enable_followup INTEGER NOT NULL,
    enable_websearch INTEGER NOT NULL,
    status TEXT NOT NULL,
    phase TEXT NOT NULL,
    current_debate_round INTEGER NOT NULL DEFAULT 0,
    synthesized_report TEXT,
    evidence_pack TEXT,
    memory_snapshot TEXT,
    evidence_generated_at TEXT,
    memory_snapshot_generated_at TEXT,
    error_message TEXT,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS agent_results (
    session_id TEXT NOT NULL,
    agent_name TEXT NOT NULL,
    status TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    content TEXT NOT NULL,
    thinking TEXT,
    sources TEXT NOT NULL,
    confidence REAL NOT NULL,
    error_message TEXT,
    created_at TEXT NOT NULL,
    completed_at TEXT,
    PRIMARY KEY (session_id, agent_name)
);

CREATE TABLE IF NOT EXISTS debate_exchanges (
    session_id TEXT NOT NULL,
    round_number INTEGER NOT NULL,
    debate_type TEXT NOT NULL,
    challenger TEXT NOT NULL,
    responder TEXT NOT NULL,
    challenge_content TEXT NOT NULL,
    response_content TEXT NOT NULL,
    followup_content TEXT,
    revised INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS workflow_events (
    session_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    agent_name TEXT,
    tool_name TEXT,
    node_id TEXT,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tool_invocations (
    session_id TEXT NOT NULL,
    invocation_id TEXT PRIMARY KEY NOT NULL,
    agent_name TEXT NOT NULL,
    tool_name TEXT NOT NULL,
    status TEXT NOT NULL,
    duration_ms INTEGER,
    input TEXT NOT NULL,
    output TEXT,
    error_message TEXT,
    context TEXT,
    model_name TEXT NOT NULL,
    cache_hit INTEGER NOT NULL,
    estimated_input_tokens INTEGER,
    estimated_output_tokens INTEGER,
    estimated_cost_usd REAL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    created_at TEXT NOT NULL
);
"#;

/// Opens (or creates) the SQLite database at `database_url` and runs the
/// embedded schema. Idempotent — safe to call once per process start.
pub async fn connect(database_url: &str) -> DbResult<DatabasePool> {
    let pool = SqlitePoolOptions::new().max_connections(5).connect(database_url).await?;
    sqlx::query(SCHEMA).execute(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_creates_all_tables() {
        let pool = connect("sqlite::memory:").await.unwrap();
        for table in ["sessions", "agent_results", "debate_exchanges", "workflow_events", "tool_invocations"] {
            let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}")).fetch_one(&pool).await.unwrap();
            assert_eq!(row.0, 0);
        }
    }
}
