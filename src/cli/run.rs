//! Run command implementation

use super::resolve_symbols;
use crate::config::Config;
use crate::data::{DepthRow, LiquidationRow, Record};
use crate::engine::Engine;
use crate::store::{MemoryStore, PostgrestStore, Store};
use crate::universe::Symbol;
use crate::ws::WsConnector;
use clap::Args;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Keep rows in memory instead of writing to the store
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    /// Ingest until `shutdown` fires; discovery failure is fatal
    pub async fn execute(&self, config: &Config, shutdown: CancellationToken) -> anyhow::Result<()> {
        let symbols = resolve_symbols(config).await?;
        if symbols.is_empty() {
            tracing::warn!("Symbol universe is empty, nothing to ingest");
            return Ok(());
        }

        if self.dry_run {
            tracing::info!("Dry run: rows are kept in memory");
            let store = Arc::new(MemoryStore::new());
            run_engine(config, store.clone(), &symbols, shutdown).await;
            tracing::info!(
                depth_rows = store.row_count(DepthRow::TABLE),
                liquidation_rows = store.row_count(LiquidationRow::TABLE),
                "Dry run complete"
            );
        } else {
            let store = Arc::new(PostgrestStore::new(config.postgrest_config()?)?);
            run_engine(config, store, &symbols, shutdown).await;
        }

        Ok(())
    }
}

async fn run_engine<S: Store>(
    config: &Config,
    store: Arc<S>,
    symbols: &[Symbol],
    shutdown: CancellationToken,
) {
    let connector = Arc::new(WsConnector::new(config.ws_config()));
    let engine = Engine::new(connector, store, config.engine_config());
    engine.start(symbols).run_until(shutdown).await;
}
