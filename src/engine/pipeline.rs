//! One feed's workers and periodic tasks

use super::flusher::{FlushConfig, Flusher};
use super::retention::{RetentionConfig, RetentionJob};
use super::watchdog::{StalenessReport, Watchdog, WatchdogConfig};
use crate::data::{Buffer, Record};
use crate::feed::FeedDecoder;
use crate::shard::Shard;
use crate::store::Store;
use crate::telemetry::{IngestStats, StatsSnapshot};
use crate::worker::{StreamWorker, Watermark, WorkerConfig, WorkerContext};
use crate::ws::Connector;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Timing for every task a pipeline runs
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub worker: WorkerConfig,
    pub flush: FlushConfig,
    pub watchdog: WatchdogConfig,
    pub retention: RetentionConfig,
}

/// A running pipeline
pub struct Pipeline {
    name: &'static str,
    table: &'static str,
    stats: Arc<IngestStats>,
    watermarks: Vec<Arc<Watermark>>,
    staleness: watch::Receiver<Option<StalenessReport>>,
    buffered: Box<dyn Fn() -> usize + Send + Sync>,
    workers: Vec<JoinHandle<()>>,
    periodic: Vec<JoinHandle<()>>,
    flusher: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Spawn one worker per shard plus the flusher, watchdog and retention job.
    ///
    /// Workers and periodic jobs stop on `worker_cancel`; the flusher stops on
    /// `flush_cancel` so it can drain after the workers are gone.
    pub fn spawn<C, D, S>(
        decoder: Arc<D>,
        shards: Vec<Shard>,
        connector: Arc<C>,
        store: Arc<S>,
        config: &PipelineConfig,
        worker_cancel: &CancellationToken,
        flush_cancel: &CancellationToken,
    ) -> Self
    where
        C: Connector,
        D: FeedDecoder,
        S: Store,
    {
        let name = decoder.name();
        let table = <D::Record as Record>::TABLE;
        let buffer: Arc<Buffer<D::Record>> = Arc::new(Buffer::new());
        let stats = Arc::new(IngestStats::new());
        let watermarks: Vec<Arc<Watermark>> =
            shards.iter().map(|_| Arc::new(Watermark::new())).collect();

        tracing::info!(feed = name, table, shards = shards.len(), "Starting pipeline");

        let workers = shards
            .into_iter()
            .zip(&watermarks)
            .map(|(shard, watermark)| {
                let worker = StreamWorker::new(
                    shard,
                    connector.clone(),
                    decoder.clone(),
                    WorkerContext {
                        buffer: buffer.clone(),
                        watermark: watermark.clone(),
                        stats: stats.clone(),
                    },
                    config.worker.clone(),
                );
                tokio::spawn(worker.run(worker_cancel.clone()))
            })
            .collect();

        let flusher = Flusher::new(
            name,
            buffer.clone(),
            store.clone(),
            stats.clone(),
            config.flush.clone(),
        );
        let flusher = tokio::spawn(flusher.run(flush_cancel.clone()));

        let (watchdog, staleness) = Watchdog::new(
            name,
            table,
            store.clone(),
            watermarks.clone(),
            config.watchdog.clone(),
        );
        let retention =
            RetentionJob::new(name, table, store, stats.clone(), config.retention.clone());
        let periodic = vec![
            tokio::spawn(watchdog.run(worker_cancel.clone())),
            tokio::spawn(retention.run(worker_cancel.clone())),
        ];

        let buffered = {
            let buffer = buffer.clone();
            Box::new(move || buffer.len())
        };

        Self {
            name,
            table,
            stats,
            watermarks,
            staleness,
            buffered,
            workers,
            periodic,
            flusher: Some(flusher),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn shard_count(&self) -> usize {
        self.watermarks.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Per-shard watermarks, indexed by shard id
    pub fn watermarks(&self) -> &[Arc<Watermark>] {
        &self.watermarks
    }

    /// Latest watchdog report; `None` until the first check
    pub fn staleness(&self) -> watch::Receiver<Option<StalenessReport>> {
        self.staleness.clone()
    }

    /// Rows waiting for the next flush
    pub fn buffered_rows(&self) -> usize {
        (self.buffered)()
    }

    /// Wait for workers and periodic jobs after `worker_cancel` fired
    pub(crate) async fn join_workers(&mut self) {
        for handle in self.workers.drain(..).chain(self.periodic.drain(..)) {
            if let Err(e) = handle.await {
                tracing::error!(feed = self.name, error = %e, "Pipeline task panicked");
            }
        }
    }

    /// Wait for the final flush after `flush_cancel` fired
    pub(crate) async fn join_flusher(&mut self) {
        if let Some(handle) = self.flusher.take() {
            if let Err(e) = handle.await {
                tracing::error!(feed = self.name, error = %e, "Flusher panicked");
            }
        }
    }
}
