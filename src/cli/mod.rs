//! CLI interface for depth-ingest
//!
//! Provides subcommands for:
//! - `run`: Start the ingestion engine
//! - `symbols`: Discover symbols and print the shard plan
//! - `config`: Show the effective configuration

mod run;
mod symbols;

pub use run::RunArgs;
pub use symbols::SymbolsArgs;

use crate::config::Config;
use crate::universe::{DiscoveryError, ExchangeInfoClient, StaticUniverse, Symbol, SymbolUniverse};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "depth-ingest")]
#[command(about = "Sharded streaming ingestion of Binance depth and liquidation feeds")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start ingesting
    Run(RunArgs),
    /// Discover symbols and print the shard plan
    Symbols(SymbolsArgs),
    /// Show the effective configuration
    Config,
}

/// Configured static symbols, or a one-shot exchange lookup
pub async fn resolve_symbols(config: &Config) -> Result<Vec<Symbol>, DiscoveryError> {
    if !config.universe.symbols.is_empty() {
        let mut symbols = StaticUniverse::new(&config.universe.symbols).discover().await?;
        if config.universe.limit > 0 {
            symbols.truncate(config.universe.limit);
        }
        tracing::info!(count = symbols.len(), "Using configured symbols");
        return Ok(symbols);
    }

    let client = ExchangeInfoClient::new(config.exchange_info_config())?;
    let symbols = client.discover().await?;
    tracing::info!(count = symbols.len(), "Discovered symbols");
    Ok(symbols)
}
