//! Freshness monitoring
//!
//! Observational only: staleness is logged, exported as a gauge and
//! published on a watch channel. Nothing is restarted.

use crate::store::Store;
use crate::telemetry::{self, GaugeMetric};
use crate::worker::Watermark;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Watchdog configuration
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Check cadence
    pub interval: Duration,
    /// Age beyond which data counts as stale
    pub threshold: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            threshold: Duration::from_secs(90),
        }
    }
}

/// Where the freshness decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessSource {
    Store,
    Watermarks,
}

/// Outcome of one freshness check
#[derive(Debug, Clone, PartialEq)]
pub struct StalenessReport {
    pub table: &'static str,
    pub checked_at: DateTime<Utc>,
    /// Newest persisted row, if the store could be read
    pub last_row_at: Option<DateTime<Utc>>,
    /// Newest decoded message across all shards
    pub freshest_watermark: Option<DateTime<Utc>>,
    /// Shards with no decoded message within the threshold
    pub stale_shards: Vec<usize>,
    pub source: FreshnessSource,
    pub stale: bool,
}

/// Periodic freshness check for one pipeline
pub struct Watchdog<S> {
    feed: &'static str,
    table: &'static str,
    store: Arc<S>,
    watermarks: Vec<Arc<Watermark>>,
    config: WatchdogConfig,
    reports: watch::Sender<Option<StalenessReport>>,
}

impl<S: Store> Watchdog<S> {
    pub fn new(
        feed: &'static str,
        table: &'static str,
        store: Arc<S>,
        watermarks: Vec<Arc<Watermark>>,
        config: WatchdogConfig,
    ) -> (Self, watch::Receiver<Option<StalenessReport>>) {
        let (reports, rx) = watch::channel(None);
        let watchdog = Self {
            feed,
            table,
            store,
            watermarks,
            config,
            reports,
        };
        (watchdog, rx)
    }

    /// Check every interval until cancelled; the first check runs after one interval
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = super::interval_after(self.config.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.check(Utc::now()).await;
                }
            }
        }
    }

    /// Evaluate freshness at `now` and publish the report
    pub async fn check(&self, now: DateTime<Utc>) -> StalenessReport {
        let threshold = chrono::Duration::from_std(self.config.threshold)
            .unwrap_or_else(|_| chrono::Duration::weeks(5_200));
        let is_stale = |at: Option<DateTime<Utc>>| at.map_or(true, |t| now - t > threshold);

        let freshest_watermark = self.watermarks.iter().filter_map(|w| w.get()).max();
        let stale_shards: Vec<usize> = self
            .watermarks
            .iter()
            .enumerate()
            .filter(|(_, w)| is_stale(w.get()))
            .map(|(id, _)| id)
            .collect();

        let (last_row_at, source) = match self.store.latest_event_time(self.table).await {
            Ok(at) => (at, FreshnessSource::Store),
            Err(e) => {
                tracing::warn!(
                    feed = self.feed,
                    table = self.table,
                    error = %e,
                    "Freshness read failed, falling back to watermarks"
                );
                (None, FreshnessSource::Watermarks)
            }
        };

        let reference = match source {
            FreshnessSource::Store => last_row_at,
            FreshnessSource::Watermarks => freshest_watermark,
        };
        let stale = is_stale(reference);

        if let Some(at) = reference {
            let age = (now - at).num_milliseconds().max(0) as f64 / 1000.0;
            telemetry::set_gauge(GaugeMetric::StalenessSeconds, self.feed, age);
        }

        if stale {
            tracing::warn!(
                feed = self.feed,
                table = self.table,
                last_row_at = ?last_row_at,
                freshest_watermark = ?freshest_watermark,
                stale_shards = ?stale_shards,
                "No fresh data within threshold"
            );
        } else {
            tracing::info!(
                feed = self.feed,
                table = self.table,
                stale_shards = stale_shards.len(),
                "Freshness check passed"
            );
        }

        let report = StalenessReport {
            table: self.table,
            checked_at: now,
            last_row_at,
            freshest_watermark,
            stale_shards,
            source,
            stale,
        };
        self.reports.send_replace(Some(report.clone()));
        report
    }
}
