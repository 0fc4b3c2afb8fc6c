//! Configuration types for depth-ingest
//!
//! Loaded from TOML with every field defaulted, then overridden from the
//! environment.

use crate::engine::{EngineConfig, FlushConfig, PipelineConfig, RetentionConfig, WatchdogConfig};
use crate::feed::{DEFAULT_DEPTH_STREAM, DEFAULT_TOP_K, MAX_TOP_K};
use crate::shard::DEFAULT_SHARD_SIZE;
use crate::store::PostgrestConfig;
use crate::telemetry::LogFormat;
use crate::universe::{ExchangeInfoConfig, BINANCE_FAPI_URL};
use crate::worker::{BackoffConfig, WorkerConfig};
use crate::ws::{WsConfig, BINANCE_FSTREAM_URL};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Longest accepted period for any timer (one year)
const MAX_PERIOD_SECS: u64 = 366 * 24 * 3600;

/// Longest accepted retention horizon
const MAX_RETENTION_DAYS: u64 = 3_650;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("missing store credentials: set SUPABASE_URL and SUPABASE_KEY")]
    MissingStoreCredentials,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub universe: UniverseConfig,
    pub feed: FeedConfig,
    pub shard: ShardConfig,
    pub worker: WorkerSettings,
    pub flush: FlushSettings,
    pub watchdog: WatchdogSettings,
    pub retention: RetentionSettings,
    pub store: StoreSettings,
    pub telemetry: TelemetryConfig,
}

/// Symbol discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    /// Fixed symbol list; skips exchange discovery when non-empty
    pub symbols: Vec<String>,
    /// Keep at most this many discovered symbols (0 = all)
    pub limit: usize,
    pub quote_asset: String,
    pub contract_type: String,
    pub rest_base_url: String,
    pub timeout_secs: u64,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            limit: 0,
            quote_asset: "USDT".to_string(),
            contract_type: "PERPETUAL".to_string(),
            rest_base_url: BINANCE_FAPI_URL.to_string(),
            timeout_secs: 15,
        }
    }
}

/// Upstream push feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub ws_base_url: String,
    /// Depth stream suffix appended to each symbol
    pub depth_stream: String,
    /// Depth levels kept per side
    pub top_k: usize,
    pub liquidations_enabled: bool,
    pub connect_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_base_url: BINANCE_FSTREAM_URL.to_string(),
            depth_stream: DEFAULT_DEPTH_STREAM.to_string(),
            top_k: DEFAULT_TOP_K,
            liquidations_enabled: true,
            connect_timeout_secs: 10,
        }
    }
}

/// Shard planning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardConfig {
    /// Symbols per connection
    pub size: usize,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SHARD_SIZE,
        }
    }
}

/// Stream worker timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub recv_timeout_secs: u64,
    pub backoff_floor_secs: u64,
    pub backoff_ceiling_secs: u64,
    /// Jitter as a fraction of the backoff (0.2 = ±20%)
    pub jitter_factor: f64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            recv_timeout_secs: 45,
            backoff_floor_secs: 5,
            backoff_ceiling_secs: 60,
            jitter_factor: 0.2,
        }
    }
}

/// Flusher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlushSettings {
    pub interval_ms: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub max_batch_rows: usize,
    pub buffer_warn_rows: usize,
}

impl Default for FlushSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            max_attempts: 3,
            retry_backoff_ms: 250,
            max_batch_rows: 5_000,
            buffer_warn_rows: 50_000,
        }
    }
}

/// Watchdog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogSettings {
    pub interval_secs: u64,
    /// Staleness threshold; defaults to twice the receive timeout
    pub threshold_secs: Option<u64>,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            threshold_secs: None,
        }
    }
}

/// Retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    pub days: u64,
    pub interval_secs: u64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            days: 7,
            interval_secs: 24 * 3600,
        }
    }
}

/// Store connection
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub url: Option<String>,
    pub key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSettings")
            .field("url", &self.url)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Prometheus exporter port (0 = disabled)
    pub metrics_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: 9090,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults if the file does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply overrides from the process environment
    ///
    /// Runs before logging is set up, so ignored values are returned for the
    /// caller to report.
    #[must_use]
    pub fn apply_env(&mut self) -> Vec<IgnoredOverride> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; unparseable values are skipped and returned
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Vec<IgnoredOverride> {
        let mut env = Overrides {
            lookup: &lookup,
            ignored: Vec::new(),
        };
        self.shard.size = env.parse("INGEST_SHARD_SIZE", self.shard.size);
        self.worker.recv_timeout_secs =
            env.parse("INGEST_RECV_TIMEOUT_SECS", self.worker.recv_timeout_secs);
        self.worker.backoff_floor_secs =
            env.parse("INGEST_BACKOFF_FLOOR_SECS", self.worker.backoff_floor_secs);
        self.worker.backoff_ceiling_secs =
            env.parse("INGEST_BACKOFF_CEILING_SECS", self.worker.backoff_ceiling_secs);
        self.flush.interval_ms = env.parse("INGEST_FLUSH_INTERVAL_MS", self.flush.interval_ms);
        self.retention.days = env.parse("INGEST_RETENTION_DAYS", self.retention.days);
        self.feed.top_k = env.parse("INGEST_TOP_K", self.feed.top_k);
        self.universe.limit = env.parse("INGEST_LIMIT_SYMBOLS", self.universe.limit);

        if let Some(level) = env.text("INGEST_LOG_LEVEL") {
            self.telemetry.log_level = level;
        }
        if let Some(url) = env.text("SUPABASE_URL") {
            self.store.url = Some(url);
        }
        if let Some(key) = env.text("SUPABASE_KEY") {
            self.store.key = Some(key);
        }
        env.ignored
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.top_k == 0 || self.feed.top_k > MAX_TOP_K {
            return Err(ConfigError::Invalid(format!(
                "feed.top_k must be between 1 and {MAX_TOP_K}"
            )));
        }
        let periods = [
            ("worker.recv_timeout_secs", self.worker.recv_timeout_secs),
            ("worker.backoff_ceiling_secs", self.worker.backoff_ceiling_secs),
            ("flush.interval_ms", self.flush.interval_ms / 1000),
            ("flush.retry_backoff_ms", self.flush.retry_backoff_ms / 1000),
            ("watchdog.interval_secs", self.watchdog.interval_secs),
            ("watchdog.threshold_secs", self.watchdog.threshold_secs.unwrap_or(0)),
            ("retention.interval_secs", self.retention.interval_secs),
        ];
        if let Some((field, _)) = periods.iter().find(|(_, secs)| *secs > MAX_PERIOD_SECS) {
            return Err(ConfigError::Invalid(format!(
                "{field} exceeds {MAX_PERIOD_SECS} seconds"
            )));
        }
        if self.retention.days > MAX_RETENTION_DAYS {
            return Err(ConfigError::Invalid(format!(
                "retention.days exceeds {MAX_RETENTION_DAYS}"
            )));
        }
        if self.worker.recv_timeout_secs == 0 {
            return Err(ConfigError::Invalid("worker.recv_timeout_secs must be positive".into()));
        }
        if self.worker.backoff_floor_secs == 0 {
            return Err(ConfigError::Invalid("worker.backoff_floor_secs must be positive".into()));
        }
        if self.worker.backoff_floor_secs > self.worker.backoff_ceiling_secs {
            return Err(ConfigError::Invalid(
                "worker.backoff_floor_secs exceeds backoff_ceiling_secs".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.worker.jitter_factor) {
            return Err(ConfigError::Invalid("worker.jitter_factor must be in [0, 1)".into()));
        }
        if self.flush.interval_ms == 0 {
            return Err(ConfigError::Invalid("flush.interval_ms must be positive".into()));
        }
        if self.flush.max_attempts == 0 {
            return Err(ConfigError::Invalid("flush.max_attempts must be at least 1".into()));
        }
        if self.flush.max_batch_rows == 0 {
            return Err(ConfigError::Invalid("flush.max_batch_rows must be at least 1".into()));
        }
        if self.watchdog.interval_secs == 0 || self.watchdog.threshold_secs == Some(0) {
            return Err(ConfigError::Invalid("watchdog intervals must be positive".into()));
        }
        if self.retention.days == 0 || self.retention.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "retention.days and retention.interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Copy with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.store.key.is_some() {
            config.store.key = Some("[REDACTED]".to_string());
        }
        config
    }

    pub fn exchange_info_config(&self) -> ExchangeInfoConfig {
        ExchangeInfoConfig {
            base_url: self.universe.rest_base_url.clone(),
            timeout: Duration::from_secs(self.universe.timeout_secs),
            quote_asset: self.universe.quote_asset.clone(),
            contract_type: self.universe.contract_type.clone(),
            limit: self.universe.limit,
        }
    }

    pub fn ws_config(&self) -> WsConfig {
        WsConfig::new(self.feed.ws_base_url.clone())
            .connect_timeout(Duration::from_secs(self.feed.connect_timeout_secs))
    }

    pub fn postgrest_config(&self) -> Result<PostgrestConfig, ConfigError> {
        match (&self.store.url, &self.store.key) {
            (Some(url), Some(key)) => {
                let mut config = PostgrestConfig::new(url.clone(), key.clone());
                config.timeout = Duration::from_secs(self.store.timeout_secs);
                Ok(config)
            }
            _ => Err(ConfigError::MissingStoreCredentials),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        let recv_timeout = Duration::from_secs(self.worker.recv_timeout_secs);
        let threshold = self
            .watchdog
            .threshold_secs
            .map_or(recv_timeout.saturating_mul(2), Duration::from_secs);

        EngineConfig {
            shard_size: self.shard.size,
            top_k: self.feed.top_k,
            depth_stream: self.feed.depth_stream.clone(),
            liquidations_enabled: self.feed.liquidations_enabled,
            pipeline: PipelineConfig {
                worker: WorkerConfig {
                    recv_timeout,
                    backoff: BackoffConfig {
                        floor: Duration::from_secs(self.worker.backoff_floor_secs),
                        ceiling: Duration::from_secs(self.worker.backoff_ceiling_secs),
                        jitter_factor: self.worker.jitter_factor,
                    },
                },
                flush: FlushConfig {
                    interval: Duration::from_millis(self.flush.interval_ms),
                    max_attempts: self.flush.max_attempts,
                    retry_backoff: Duration::from_millis(self.flush.retry_backoff_ms),
                    max_batch_rows: self.flush.max_batch_rows,
                    buffer_warn_rows: self.flush.buffer_warn_rows,
                },
                watchdog: WatchdogConfig {
                    interval: Duration::from_secs(self.watchdog.interval_secs),
                    threshold,
                },
                retention: RetentionConfig {
                    horizon: Duration::from_secs(self.retention.days.saturating_mul(24 * 3600)),
                    interval: Duration::from_secs(self.retention.interval_secs),
                },
            },
        }
    }
}

/// An environment value that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredOverride {
    pub key: &'static str,
    pub value: String,
}

struct Overrides<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
    ignored: Vec<IgnoredOverride>,
}

impl Overrides<'_> {
    fn text(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&mut self, key: &'static str, current: T) -> T {
        let Some(raw) = self.text(key) else {
            return current;
        };
        match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                self.ignored.push(IgnoredOverride { key, value: raw });
                current
            }
        }
    }
}
