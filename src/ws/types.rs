//! WebSocket types and configuration

use std::time::Duration;

/// Binance USDⓈ-M futures WebSocket base URL
pub const BINANCE_FSTREAM_URL: &str = "wss://fstream.binance.com";

/// WebSocket connector configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Base URL; the combined-stream path is appended per connection
    pub base_url: String,
    /// Upper bound on the handshake of a single connection attempt
    pub connect_timeout: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            base_url: BINANCE_FSTREAM_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl WsConfig {
    /// Create a new config with the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.connect_timeout = d;
        self
    }
}

/// Connection-level failures, recovered from inside the stream worker
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectionError {
    /// Handshake refused or failed
    #[error("connection failed: {0}")]
    ConnectFailed(String),
    /// Handshake did not complete in time
    #[error("connection attempt timed out")]
    Timeout,
    /// Keepalive probe went unanswered
    #[error("pong timeout")]
    PongTimeout,
    /// Writing a frame failed
    #[error("send failed: {0}")]
    SendFailed(String),
    /// Transport or protocol error while reading
    #[error("protocol error: {0}")]
    Protocol(String),
}
