//! Per-shard stream worker
//!
//! Each worker owns one upstream connection and drives it through an explicit
//! state machine:
//!
//! - `Connecting`: open the subscription; on failure wait out the backoff
//! - `Streaming`: receive frames up to the receive timeout, decode, append
//! - `AwaitingPong`: probe an idle connection
//! - `Closed`: tear down, wait out the backoff, connect again

mod backoff;
mod state;

pub use backoff::{Backoff, BackoffConfig};
pub use state::{ConnectionState, Watermark};

use crate::data::Buffer;
use crate::feed::FeedDecoder;
use crate::shard::Shard;
use crate::telemetry::{self, CounterMetric, GaugeMetric, IngestStats};
use crate::ws::{Connector, FeedConnection};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Upper bound on a graceful close of a dead connection
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Stream worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Silence tolerated before probing the connection; also bounds the probe
    pub recv_timeout: Duration,
    /// Reconnect backoff
    pub backoff: BackoffConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            recv_timeout: Duration::from_secs(45),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Shared handles a worker writes into
pub struct WorkerContext<R> {
    pub buffer: Arc<Buffer<R>>,
    pub watermark: Arc<Watermark>,
    pub stats: Arc<IngestStats>,
}

/// Maintains one shard's subscription and feeds decoded rows to the buffer
pub struct StreamWorker<C: Connector, D: FeedDecoder> {
    shard: Shard,
    topics: Vec<String>,
    connector: Arc<C>,
    decoder: Arc<D>,
    ctx: WorkerContext<D::Record>,
    config: WorkerConfig,
    backoff: Backoff,
    state: ConnectionState,
}

impl<C: Connector, D: FeedDecoder> StreamWorker<C, D> {
    pub fn new(
        shard: Shard,
        connector: Arc<C>,
        decoder: Arc<D>,
        ctx: WorkerContext<D::Record>,
        config: WorkerConfig,
    ) -> Self {
        let topics = decoder.topics(&shard.symbols);
        let backoff = Backoff::new(config.backoff.clone());
        Self {
            shard,
            topics,
            connector,
            decoder,
            ctx,
            config,
            backoff,
            state: ConnectionState::Connecting,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Run until `cancel` fires, then close the connection
    pub async fn run(mut self, cancel: CancellationToken) {
        let feed = self.decoder.name();
        let shard = self.shard.id;
        tracing::info!(feed, shard, topics = self.topics.len(), "Stream worker starting");

        let mut conn: Option<C::Connection> = None;
        while let Some(next) = self.step(&mut conn, &cancel).await {
            if next != self.state {
                tracing::debug!(feed, shard, from = %self.state, to = %next, "State transition");
            }
            self.state = next;
        }

        if let Some(mut c) = conn.take() {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, c.close()).await;
        }
        self.state = ConnectionState::Closed;
        telemetry::set_shard_gauge(GaugeMetric::ShardConnected, feed, shard, 0.0);
        tracing::info!(feed, shard, "Stream worker stopped");
    }

    /// Execute the current state; `None` means shutdown was requested
    async fn step(
        &mut self,
        conn: &mut Option<C::Connection>,
        cancel: &CancellationToken,
    ) -> Option<ConnectionState> {
        let feed = self.decoder.name();
        let shard = self.shard.id;

        match self.state {
            ConnectionState::Connecting => {
                let attempt = tokio::select! {
                    _ = cancel.cancelled() => return None,
                    result = self.connector.connect(&self.topics) => result,
                };

                match attempt {
                    Ok(c) => {
                        *conn = Some(c);
                        self.backoff.reset();
                        telemetry::set_shard_gauge(GaugeMetric::ShardConnected, feed, shard, 1.0);
                        tracing::info!(feed, shard, "Shard connected");
                        Some(ConnectionState::Streaming)
                    }
                    Err(e) => {
                        tracing::warn!(feed, shard, error = %e, "Connection attempt failed");
                        self.wait_backoff(cancel)
                            .await
                            .then_some(ConnectionState::Connecting)
                    }
                }
            }

            ConnectionState::Streaming => {
                let Some(c) = conn.as_mut() else {
                    return Some(ConnectionState::Closed);
                };

                let received = tokio::select! {
                    _ = cancel.cancelled() => return None,
                    result = tokio::time::timeout(self.config.recv_timeout, c.next_text()) => result,
                };

                match received {
                    Err(_) => {
                        tracing::debug!(feed, shard, "No messages within receive timeout");
                        Some(ConnectionState::AwaitingPong)
                    }
                    Ok(Some(Ok(text))) => {
                        self.handle_text(&text);
                        Some(ConnectionState::Streaming)
                    }
                    Ok(Some(Err(e))) => {
                        tracing::warn!(feed, shard, error = %e, "Connection error");
                        Some(ConnectionState::Closed)
                    }
                    Ok(None) => {
                        tracing::warn!(feed, shard, "Connection closed by peer");
                        Some(ConnectionState::Closed)
                    }
                }
            }

            ConnectionState::AwaitingPong => {
                let Some(c) = conn.as_mut() else {
                    return Some(ConnectionState::Closed);
                };

                // a probe that cannot be sent within the receive timeout counts as dead
                let probe = tokio::select! {
                    _ = cancel.cancelled() => return None,
                    result = tokio::time::timeout(self.config.recv_timeout, c.ping()) => result,
                };

                match probe {
                    Ok(Ok(())) => Some(ConnectionState::Streaming),
                    Ok(Err(e)) => {
                        tracing::warn!(feed, shard, error = %e, "Keepalive probe failed");
                        Some(ConnectionState::Closed)
                    }
                    Err(_) => {
                        tracing::warn!(feed, shard, "Keepalive probe timed out");
                        Some(ConnectionState::Closed)
                    }
                }
            }

            ConnectionState::Closed => {
                if let Some(mut c) = conn.take() {
                    let _ = tokio::time::timeout(CLOSE_TIMEOUT, c.close()).await;
                }
                telemetry::set_shard_gauge(GaugeMetric::ShardConnected, feed, shard, 0.0);
                telemetry::increment(CounterMetric::Reconnects, feed, 1);
                self.ctx.stats.record_reconnect();

                self.wait_backoff(cancel)
                    .await
                    .then_some(ConnectionState::Connecting)
            }
        }
    }

    /// Decode one frame and append its rows; decode failures drop the frame
    fn handle_text(&self, text: &str) {
        let feed = self.decoder.name();
        self.ctx.stats.record_message();
        telemetry::increment(CounterMetric::MessagesReceived, feed, 1);

        match self.decoder.decode(text) {
            Ok(rows) => {
                self.ctx.watermark.advance(Utc::now());
                if rows.is_empty() {
                    return;
                }
                let count = rows.len() as u64;
                self.ctx.buffer.append(rows);
                self.ctx.stats.record_rows_appended(count);
                telemetry::increment(CounterMetric::RowsAppended, feed, count);
            }
            Err(e) => {
                self.ctx.stats.record_decode_error();
                telemetry::increment(CounterMetric::DecodeErrors, feed, 1);
                tracing::warn!(feed, shard = self.shard.id, error = %e, "Discarding undecodable message");
            }
        }
    }

    /// Sleep for the next backoff delay; `false` if cancelled meanwhile
    async fn wait_backoff(&mut self, cancel: &CancellationToken) -> bool {
        let delay = self.backoff.next_delay();
        tracing::info!(
            feed = self.decoder.name(),
            shard = self.shard.id,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting after backoff"
        );

        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
