//! # Kasir Terminal
//!
//! Headless runner for one terminal: loads config, opens the database,
//! restores state and keeps the persist writer alive until Ctrl+C.
//!
//! ## Usage
//! ```bash
//! cargo run -p kasir-terminal
//!
//! # Explicit config file, verbose logs
//! RUST_LOG=debug cargo run -p kasir-terminal -- --config ./kasir.toml
//! ```

use std::env;
use std::path::PathBuf;

use kasir_terminal::{Terminal, TerminalConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = parse_config_arg();
    let config = TerminalConfig::load(config_path)?;

    info!(
        terminal = %config.terminal.id,
        code = %config.terminal.code,
        store = %config.terminal.store_name,
        "Starting Kasir terminal"
    );

    let terminal = Terminal::open(config).await?;

    terminal.with_state(|state| {
        info!(
            products = state.inventory().products().count(),
            customers = state.customers.len(),
            held_carts = state.held.list().len(),
            transactions = state.transactions.len(),
            "State restored"
        );
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    if let Err(e) = terminal.close().await {
        error!(error = %e, "Some changes were not persisted");
        return Err(e.into());
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,kasir=debug,sqlx=warn")),
        )
        .with_target(true)
        .init();
}

fn parse_config_arg() -> Option<PathBuf> {
    let args: Vec<String> = env::args().collect();
    args.iter()
        .position(|a| a == "--config" || a == "-c")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}
