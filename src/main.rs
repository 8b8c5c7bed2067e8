//! Commission Engine - order-paid event consumer
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌────────────┐    ┌────────────┐
//! │  Config  │───▶│ Postgres │───▶│ Calculator │───▶│ AutoUpgrade│
//! │  (YAML)  │    │ (schema) │    │   (tx 1)   │    │   (tx 2)   │
//! └──────────┘    └──────────┘    └────────────┘    └────────────┘
//! ```
//!
//! Usage: `commission_engine [--env dev] [--input events.ndjson]`
//! Without `--input`, events are read from stdin.

use anyhow::Context;
use tokio::io::BufReader;

use commission_engine::config::AppConfig;
use commission_engine::db::Database;
use commission_engine::engine::CommissionEngine;
use commission_engine::intake::run_intake;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn get_input() -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--input" && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = commission_engine::logging::init_logging(&app_config);

    tracing::info!("Starting Commission Engine in {} mode", env);

    let url = app_config
        .postgres_url
        .as_deref()
        .context("postgres_url is not configured (set it in the YAML or DATABASE_URL)")?;
    let db = Database::connect(url, &app_config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db.apply_schema().await.context("Failed to apply schema")?;

    let engine = CommissionEngine::new(db, &app_config);

    let summary = match get_input() {
        Some(path) => {
            tracing::info!(path = %path, "Reading order-paid events from file");
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open input file: {}", path))?;
            run_intake(&engine, BufReader::new(file)).await?
        }
        None => {
            tracing::info!("Reading order-paid events from stdin");
            run_intake(&engine, BufReader::new(tokio::io::stdin())).await?
        }
    };

    if summary.failed > 0 {
        tracing::warn!(failed = summary.failed, "Some events failed; redeliver them to retry");
    }
    Ok(())
}
