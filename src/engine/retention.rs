//! Age-based pruning of stored rows

use crate::store::{RetentionError, Store};
use crate::telemetry::{self, CounterMetric, IngestStats};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Retention configuration
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Rows older than this are deleted
    pub horizon: Duration,
    /// Run cadence
    pub interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            horizon: Duration::from_secs(7 * 24 * 3600),
            interval: Duration::from_secs(24 * 3600),
        }
    }
}

/// Deletes rows of one table older than the horizon
pub struct RetentionJob<S> {
    feed: &'static str,
    table: &'static str,
    store: Arc<S>,
    stats: Arc<IngestStats>,
    config: RetentionConfig,
}

impl<S: Store> RetentionJob<S> {
    pub fn new(
        feed: &'static str,
        table: &'static str,
        store: Arc<S>,
        stats: Arc<IngestStats>,
        config: RetentionConfig,
    ) -> Self {
        Self {
            feed,
            table,
            store,
            stats,
            config,
        }
    }

    /// Run immediately, then every interval until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once(Utc::now()).await {
                        tracing::error!(
                            feed = self.feed,
                            table = self.table,
                            error = %e,
                            "Retention run failed, retrying next interval"
                        );
                    }
                }
            }
        }
    }

    /// Delete everything with `event_time < now - horizon`
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<u64, RetentionError> {
        let horizon = chrono::Duration::from_std(self.config.horizon)
            .unwrap_or_else(|_| chrono::Duration::weeks(5_200));
        let cutoff = now - horizon;

        let deleted = self.store.delete_before(self.table, cutoff).await?;
        self.stats.record_retention_deleted(deleted);
        telemetry::increment(CounterMetric::RetentionDeleted, self.feed, deleted);

        tracing::info!(
            feed = self.feed,
            table = self.table,
            cutoff = %cutoff,
            deleted,
            "Retention run complete"
        );
        Ok(deleted)
    }
}
