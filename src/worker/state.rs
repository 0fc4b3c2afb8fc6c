//! Per-shard connection state and freshness watermark

use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Lifecycle of a shard's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Streaming,
    AwaitingPong,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Streaming => "streaming",
            ConnectionState::AwaitingPong => "awaiting_pong",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Time of the last successfully decoded message on a shard.
///
/// Written by the owning worker, read by the watchdog.
#[derive(Debug, Default)]
pub struct Watermark {
    /// Milliseconds since epoch; 0 = nothing decoded yet
    millis: AtomicI64,
}

impl Watermark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, at: DateTime<Utc>) {
        self.millis.fetch_max(at.timestamp_millis(), Ordering::Release);
    }

    pub fn get(&self) -> Option<DateTime<Utc>> {
        match self.millis.load(Ordering::Acquire) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }
}
