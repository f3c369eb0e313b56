//! Bank Ledger server
//!
//! ```text
//! bank_ledger [--env dev] [--port 8080] [--memory]
//! ```
//!
//! `--memory` serves from the in-memory store instead of PostgreSQL.

use std::sync::Arc;

use anyhow::{Context, Result, bail};

use bank_ledger::auth::TokenMaker;
use bank_ledger::config::AppConfig;
use bank_ledger::db::Database;
use bank_ledger::gateway::{self, state::AppState};
use bank_ledger::ledger::{LedgerStore, MemoryLedgerStore, PgLedgerStore};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

fn use_memory_store() -> bool {
    std::env::args().any(|a| a == "--memory")
}

async fn build_store(config: &AppConfig) -> Result<Arc<dyn LedgerStore>> {
    if use_memory_store() {
        tracing::warn!("Using in-memory ledger store; nothing survives a restart");
        return Ok(Arc::new(MemoryLedgerStore::new()));
    }

    let Some(url) = config.postgres_url.as_deref() else {
        bail!("postgres_url is not configured (set DATABASE_URL or pass --memory)");
    };
    let db = Database::connect(url, config.postgres_max_connections)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db.init_schema()
        .await
        .context("Failed to initialize ledger schema")?;
    Ok(Arc::new(PgLedgerStore::new(db.pool().clone())))
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _guard = bank_ledger::logging::init_logging(&config);

    tracing::info!("Starting Bank Ledger in {} mode", env);

    let store = build_store(&config).await?;
    let token_maker = TokenMaker::new(&config.token.symmetric_key)
        .context("Invalid token.symmetric_key")?;

    let mut state = AppState::new(store, token_maker, config.token.access_token_duration());
    if let Some(limit) = config.transfer.unit_timeout() {
        state = state.with_transfer_timeout(limit);
    }

    let port = get_port_override().unwrap_or(config.gateway.port);
    gateway::run_server(&config.gateway.host, port, Arc::new(state)).await
}
