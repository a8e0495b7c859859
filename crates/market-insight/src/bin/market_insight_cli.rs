//! Thin CLI standing in for the excluded HTTP/SSE transport: drives one
//! session end to end from a JSON profile file or stdin, printing every
//! `SessionEvent` as an NDJSON line to stdout.

use clap::Parser;
use futures::StreamExt;
use llm_client::{FakeLlmClient, ScriptedReply};
use market_insight::config::WorkflowConfig;
use market_insight::types::{DegradeMode, Profile};
use market_insight::OrchestratorConfig;
use std::io::{Read, Write};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "market-insight-cli")]
#[command(about = "Drive one market-insight session and stream its events as NDJSON", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to a JSON profile file; reads stdin when omitted.
    #[arg(short, long)]
    profile: Option<std::path::PathBuf>,

    /// SQLite database URL for durable session storage.
    #[arg(long, default_value = "sqlite::memory:")]
    database_url: String,

    /// Number of debate rounds: 0 (none), 1 (peer only), 2 (peer + red team).
    #[arg(long, default_value_t = 1)]
    debate_rounds: u8,

    /// Degrade mode on retry exhaustion: skip, partial, or fail.
    #[arg(long, default_value = "partial")]
    degrade_mode: String,

    /// Disable web search for this session even if otherwise enabled.
    #[arg(long)]
    no_websearch: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let cli = Cli::parse();

    let profile_json = match &cli.profile {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let profile: Profile = serde_json::from_str(&profile_json)?;

    let degrade_mode = match cli.degrade_mode.as_str() {
        "skip" => DegradeMode::Skip,
        "partial" => DegradeMode::Partial,
        "fail" => DegradeMode::Fail,
        other => anyhow::bail!("unknown --degrade-mode {other:?}, expected skip|partial|fail"),
    };

    tracing::info!(database_url = %cli.database_url, "connecting to session store");
    let db = market_insight::db::connect(&cli.database_url).await?;

    let mut workflow = WorkflowConfig { debate_rounds: cli.debate_rounds, degrade_mode, ..WorkflowConfig::default() };
    workflow.validate_for_request()?;

    let llm_client = Arc::new(demo_llm_client());

    let mut config = OrchestratorConfig::new(llm_client, db);
    config.workflow = workflow;
    config.enable_websearch = !cli.no_websearch;

    let mut stream = Box::pin(market_insight::run_session(profile, config));
    let stdout = std::io::stdout();
    while let Some(event) = stream.next().await {
        let line = serde_json::to_string(&event)?;
        writeln!(stdout.lock(), "{line}")?;
    }

    Ok(())
}

/// A scripted client standing in for the out-of-scope real provider
/// integration, so the CLI can exercise the full engine offline.
fn demo_llm_client() -> FakeLlmClient {
    FakeLlmClient::new(vec![
        ScriptedReply::text("Category demand is trending upward quarter over quarter.").with_sources(["https://example.com/trend-report"]),
        ScriptedReply::text("Three incumbent competitors dominate the top price tiers."),
        ScriptedReply::text("No blocking regulatory constraints identified for this market."),
        ScriptedReply::text("Social sentiment skews positive with rising engagement."),
    ])
}
