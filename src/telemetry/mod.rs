//! Telemetry module
//!
//! Logging, Prometheus metrics and in-process ingestion counters

mod logging;
mod metrics;
mod stats;

pub use logging::{init_logging, LogFormat};
pub use metrics::{increment, init_metrics, set_gauge, set_shard_gauge, CounterMetric, GaugeMetric};
pub use stats::{IngestStats, StatsSnapshot};

use crate::config::TelemetryConfig;

/// Initialize all telemetry subsystems
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&config.log_level, config.log_format)?;

    if config.metrics_port != 0 {
        init_metrics(config.metrics_port)?;
    }

    Ok(())
}
