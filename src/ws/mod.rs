//! WebSocket transport
//!
//! The stream worker talks to the network only through [`Connector`] and
//! [`FeedConnection`], so reconnect behavior can be exercised without I/O.

mod client;
mod types;

pub use client::{WsConnection, WsConnector};
pub use types::{ConnectionError, WsConfig, BINANCE_FSTREAM_URL};

use async_trait::async_trait;

/// Opens subscriptions to the upstream push feed
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: FeedConnection;

    /// Open a connection subscribed to every topic
    async fn connect(&self, topics: &[String]) -> Result<Self::Connection, ConnectionError>;
}

/// One open subscription
#[async_trait]
pub trait FeedConnection: Send + 'static {
    /// Next text frame; `None` once the peer has closed the connection.
    ///
    /// Must be cancel-safe: the worker races it against a receive timeout.
    async fn next_text(&mut self) -> Option<Result<String, ConnectionError>>;

    /// Send an application-level keepalive probe
    async fn ping(&mut self) -> Result<(), ConnectionError>;

    /// Tear the connection down
    async fn close(&mut self);
}
