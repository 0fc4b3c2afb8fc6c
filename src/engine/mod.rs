//! Ingestion engine
//!
//! Composes the depth and liquidation pipelines over a shared connector and
//! store, and owns the shutdown sequence:
//!
//! 1. Stop every worker and periodic job, wait for them to close
//! 2. Stop the flushers, each doing a final drain-and-write
//!
//! ```text
//! SymbolUniverse ─► partition ─► StreamWorker × N ─► Buffer ─► Flusher ─► Store
//!                                       │                                  ▲
//!                                   Watermark ─────────► Watchdog ─────────┤
//!                                                        RetentionJob ─────┘
//! ```

mod flusher;
mod pipeline;
mod retention;
mod watchdog;

pub use flusher::{FlushConfig, FlushOutcome, Flusher};
pub use pipeline::{Pipeline, PipelineConfig};
pub use retention::{RetentionConfig, RetentionJob};
pub use watchdog::{FreshnessSource, StalenessReport, Watchdog, WatchdogConfig};

use crate::feed::{DepthDecoder, LiquidationDecoder, DEFAULT_DEPTH_STREAM, DEFAULT_TOP_K};
use crate::shard::{self, Shard, DEFAULT_SHARD_SIZE};
use crate::store::Store;
use crate::telemetry::StatsSnapshot;
use crate::universe::Symbol;
use crate::ws::Connector;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Stand-in deadline for periods too long to represent
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Ticker whose first tick is one `period` from now; late ticks are delayed
pub(crate) fn interval_after(period: Duration) -> Interval {
    let now = Instant::now();
    let start = now
        .checked_add(period)
        .unwrap_or_else(|| now + FAR_FUTURE);
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Symbols per depth subscription
    pub shard_size: usize,
    /// Levels kept per side of each depth snapshot
    pub top_k: usize,
    /// Depth stream suffix, e.g. `depth20@100ms`
    pub depth_stream: String,
    /// Also ingest the all-market liquidation stream
    pub liquidations_enabled: bool,
    pub pipeline: PipelineConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shard_size: DEFAULT_SHARD_SIZE,
            top_k: DEFAULT_TOP_K,
            depth_stream: DEFAULT_DEPTH_STREAM.to_string(),
            liquidations_enabled: true,
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Builds and starts pipelines
pub struct Engine<C, S> {
    connector: Arc<C>,
    store: Arc<S>,
    config: EngineConfig,
}

impl<C: Connector, S: Store> Engine<C, S> {
    pub fn new(connector: Arc<C>, store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            connector,
            store,
            config,
        }
    }

    /// Depth shards for `symbols`
    pub fn shard_plan(&self, symbols: &[Symbol]) -> Vec<Shard> {
        shard::partition(symbols, self.config.shard_size)
    }

    /// Spawn every pipeline; an empty universe starts nothing
    pub fn start(&self, symbols: &[Symbol]) -> EngineHandle {
        let worker_cancel = CancellationToken::new();
        let flush_cancel = CancellationToken::new();
        let mut pipelines = Vec::new();

        let shards = self.shard_plan(symbols);
        if shards.is_empty() {
            tracing::warn!("No symbols to ingest, engine idle");
            return EngineHandle {
                pipelines,
                worker_cancel,
                flush_cancel,
            };
        }

        tracing::info!(
            symbols = symbols.len(),
            shards = shards.len(),
            shard_size = self.config.shard_size,
            "Starting ingestion engine"
        );

        let depth = Arc::new(DepthDecoder::new(
            self.config.top_k,
            self.config.depth_stream.clone(),
        ));
        pipelines.push(Pipeline::spawn(
            depth,
            shards,
            self.connector.clone(),
            self.store.clone(),
            &self.config.pipeline,
            &worker_cancel,
            &flush_cancel,
        ));

        if self.config.liquidations_enabled {
            pipelines.push(Pipeline::spawn(
                Arc::new(LiquidationDecoder::new()),
                vec![Shard::new(0, Vec::new())],
                self.connector.clone(),
                self.store.clone(),
                &self.config.pipeline,
                &worker_cancel,
                &flush_cancel,
            ));
        }

        EngineHandle {
            pipelines,
            worker_cancel,
            flush_cancel,
        }
    }
}

/// Handle to a running engine
pub struct EngineHandle {
    pipelines: Vec<Pipeline>,
    worker_cancel: CancellationToken,
    flush_cancel: CancellationToken,
}

impl EngineHandle {
    /// True when nothing was started
    pub fn is_idle(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.name() == name)
    }

    /// Counter snapshot per pipeline
    pub fn stats(&self) -> Vec<(&'static str, StatsSnapshot)> {
        self.pipelines.iter().map(|p| (p.name(), p.stats())).collect()
    }

    /// Run until `signal` fires, then shut down
    pub async fn run_until(self, signal: CancellationToken) {
        if !self.is_idle() {
            signal.cancelled().await;
        }
        self.shutdown().await;
    }

    /// Close every connection, then flush what is left
    pub async fn shutdown(mut self) {
        tracing::info!("Shutting down ingestion engine");

        self.worker_cancel.cancel();
        for pipeline in &mut self.pipelines {
            pipeline.join_workers().await;
        }

        self.flush_cancel.cancel();
        for pipeline in &mut self.pipelines {
            pipeline.join_flusher().await;
        }

        for (feed, stats) in self.stats() {
            tracing::info!(
                feed,
                messages = stats.messages_received,
                decode_errors = stats.decode_errors,
                rows_flushed = stats.rows_flushed,
                batches_dropped = stats.batches_dropped,
                reconnects = stats.reconnects,
                "Pipeline stopped"
            );
        }
    }
}
