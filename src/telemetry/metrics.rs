//! Prometheus metrics

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Text frames received from the feed
    MessagesReceived,
    /// Frames dropped because they could not be decoded
    DecodeErrors,
    /// Rows appended to the buffer
    RowsAppended,
    /// Rows written to the store
    RowsFlushed,
    /// Batches dropped after exhausting write retries
    BatchesDropped,
    /// Rows inside dropped batches
    RowsDropped,
    /// Connections torn down and re-established
    Reconnects,
    /// Rows removed by retention
    RetentionDeleted,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Rows waiting in the buffer
    BufferRows,
    /// 1 while a shard's connection is open
    ShardConnected,
    /// Seconds since the most recent row landed
    StalenessSeconds,
}

impl CounterMetric {
    pub const fn name(self) -> &'static str {
        match self {
            CounterMetric::MessagesReceived => "ingest_messages_received_total",
            CounterMetric::DecodeErrors => "ingest_decode_errors_total",
            CounterMetric::RowsAppended => "ingest_rows_appended_total",
            CounterMetric::RowsFlushed => "ingest_rows_flushed_total",
            CounterMetric::BatchesDropped => "ingest_batches_dropped_total",
            CounterMetric::RowsDropped => "ingest_rows_dropped_total",
            CounterMetric::Reconnects => "ingest_reconnects_total",
            CounterMetric::RetentionDeleted => "ingest_retention_deleted_total",
        }
    }
}

impl GaugeMetric {
    pub const fn name(self) -> &'static str {
        match self {
            GaugeMetric::BufferRows => "ingest_buffer_rows",
            GaugeMetric::ShardConnected => "ingest_shard_connected",
            GaugeMetric::StalenessSeconds => "ingest_staleness_seconds",
        }
    }
}

/// Increment a counter labelled by feed
pub fn increment(metric: CounterMetric, feed: &'static str, value: u64) {
    counter!(metric.name(), "feed" => feed).increment(value);
}

/// Set a gauge labelled by feed
pub fn set_gauge(metric: GaugeMetric, feed: &'static str, value: f64) {
    gauge!(metric.name(), "feed" => feed).set(value);
}

/// Set a gauge labelled by feed and shard
pub fn set_shard_gauge(metric: GaugeMetric, feed: &'static str, shard: usize, value: f64) {
    gauge!(metric.name(), "feed" => feed, "shard" => shard.to_string()).set(value);
}

fn describe_metrics() {
    describe_counter!(
        CounterMetric::MessagesReceived.name(),
        "Text frames received from the upstream feed"
    );
    describe_counter!(
        CounterMetric::DecodeErrors.name(),
        "Frames discarded because they failed to decode"
    );
    describe_counter!(CounterMetric::RowsAppended.name(), "Rows appended to the buffer");
    describe_counter!(CounterMetric::RowsFlushed.name(), "Rows written to the store");
    describe_counter!(
        CounterMetric::BatchesDropped.name(),
        "Batches dropped after exhausting store write retries"
    );
    describe_counter!(CounterMetric::RowsDropped.name(), "Rows inside dropped batches");
    describe_counter!(CounterMetric::Reconnects.name(), "Shard reconnections");
    describe_counter!(
        CounterMetric::RetentionDeleted.name(),
        "Rows deleted by the retention job"
    );
    describe_gauge!(GaugeMetric::BufferRows.name(), "Rows drained at the last flush tick");
    describe_gauge!(
        GaugeMetric::ShardConnected.name(),
        "Whether a shard's connection is open"
    );
    describe_gauge!(
        GaugeMetric::StalenessSeconds.name(),
        "Age in seconds of the freshest data seen by the watchdog"
    );
}

/// Start the Prometheus scrape endpoint on `port`
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;

    describe_metrics();
    tracing::info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}
