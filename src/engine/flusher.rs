//! Periodic buffer drain into the store

use crate::data::{Buffer, Record};
use crate::store::{Store, StoreWriteError};
use crate::telemetry::{self, CounterMetric, GaugeMetric, IngestStats};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Flusher configuration
#[derive(Debug, Clone)]
pub struct FlushConfig {
    /// Tick cadence
    pub interval: Duration,
    /// Write attempts per chunk, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per retry
    pub retry_backoff: Duration,
    /// Largest chunk sent in one write
    pub max_batch_rows: usize,
    /// Warn when a drain returns more rows than this
    pub buffer_warn_rows: usize,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(250),
            max_batch_rows: 5_000,
            buffer_warn_rows: 50_000,
        }
    }
}

/// Result of one drain-and-write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    pub rows_written: usize,
    pub rows_dropped: usize,
    pub batches_dropped: usize,
}

impl FlushOutcome {
    pub fn is_empty(&self) -> bool {
        self.rows_written == 0 && self.rows_dropped == 0
    }
}

/// Sole drainer of a pipeline's buffer
pub struct Flusher<S, R> {
    feed: &'static str,
    buffer: Arc<Buffer<R>>,
    store: Arc<S>,
    stats: Arc<IngestStats>,
    config: FlushConfig,
}

impl<S: Store, R: Record> Flusher<S, R> {
    pub fn new(
        feed: &'static str,
        buffer: Arc<Buffer<R>>,
        store: Arc<S>,
        stats: Arc<IngestStats>,
        config: FlushConfig,
    ) -> Self {
        Self {
            feed,
            buffer,
            store,
            stats,
            config,
        }
    }

    /// Tick until `cancel` fires, then drain one final time
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = super::interval_after(self.config.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.flush_once().await;
                }
            }
        }

        let outcome = self.flush_once().await;
        tracing::info!(
            feed = self.feed,
            table = R::TABLE,
            rows_written = outcome.rows_written,
            rows_dropped = outcome.rows_dropped,
            "Final flush complete"
        );
    }

    /// Drain the buffer and write everything it held
    pub async fn flush_once(&self) -> FlushOutcome {
        let rows = self.buffer.drain();
        telemetry::set_gauge(GaugeMetric::BufferRows, self.feed, rows.len() as f64);

        let mut outcome = FlushOutcome::default();
        if rows.is_empty() {
            return outcome;
        }

        if rows.len() > self.config.buffer_warn_rows {
            tracing::warn!(
                feed = self.feed,
                rows = rows.len(),
                threshold = self.config.buffer_warn_rows,
                "Buffer above high-water mark"
            );
        }

        for chunk in rows.chunks(self.config.max_batch_rows.max(1)) {
            match self.write_chunk(chunk).await {
                Ok(()) => {
                    outcome.rows_written += chunk.len();
                    self.stats.record_rows_flushed(chunk.len() as u64);
                    telemetry::increment(CounterMetric::RowsFlushed, self.feed, chunk.len() as u64);
                }
                Err(e) => {
                    outcome.rows_dropped += chunk.len();
                    outcome.batches_dropped += 1;
                    self.stats.record_batch_dropped(chunk.len() as u64);
                    telemetry::increment(CounterMetric::BatchesDropped, self.feed, 1);
                    telemetry::increment(CounterMetric::RowsDropped, self.feed, chunk.len() as u64);
                    tracing::error!(
                        feed = self.feed,
                        table = R::TABLE,
                        rows = chunk.len(),
                        error = %e,
                        "Dropping batch after exhausting retries"
                    );
                }
            }
        }

        tracing::debug!(
            feed = self.feed,
            table = R::TABLE,
            rows_written = outcome.rows_written,
            rows_dropped = outcome.rows_dropped,
            "Flushed buffer"
        );
        outcome
    }

    /// Write one chunk with bounded retries
    async fn write_chunk(&self, chunk: &[R]) -> Result<(), StoreWriteError> {
        let attempts = self.config.max_attempts.max(1);
        let mut delay = self.config.retry_backoff;
        let mut attempt = 1;

        loop {
            match self.store.upsert(chunk).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        feed = self.feed,
                        table = R::TABLE,
                        attempt,
                        error = %e,
                        "Store write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
            }
        }
    }
}
