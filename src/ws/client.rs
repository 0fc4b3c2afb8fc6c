//! tokio-tungstenite backed connector for combined streams

use super::types::{ConnectionError, WsConfig};
use super::{Connector, FeedConnection};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

/// Opens one combined-stream WebSocket per shard
pub struct WsConnector {
    config: WsConfig,
}

impl WsConnector {
    /// Create a new connector with the given configuration
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    /// Create a connector for a base URL using default config
    pub fn with_url(url: impl Into<String>) -> Self {
        Self::new(WsConfig::new(url))
    }

    /// Get the configured base URL
    pub fn url(&self) -> &str {
        &self.config.base_url
    }

    /// Combined-stream URL subscribing to every topic
    pub fn stream_url(&self, topics: &[String]) -> String {
        format!(
            "{}/stream?streams={}",
            self.config.base_url.trim_end_matches('/'),
            topics.join("/")
        )
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Connection = WsConnection;

    async fn connect(&self, topics: &[String]) -> Result<WsConnection, ConnectionError> {
        let url = self.stream_url(topics);
        tracing::debug!(url = %url, topics = topics.len(), "Connecting to WebSocket");

        let (stream, _response) = tokio::time::timeout(self.config.connect_timeout, connect_async(&url))
            .await
            .map_err(|_| ConnectionError::Timeout)?
            .map_err(|e| ConnectionError::ConnectFailed(e.to_string()))?;

        Ok(WsConnection {
            stream,
            awaiting_pong: false,
        })
    }
}

/// A live WebSocket connection
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// A ping was sent and no frame has arrived since
    awaiting_pong: bool,
}

#[async_trait]
impl FeedConnection for WsConnection {
    async fn next_text(&mut self) -> Option<Result<String, ConnectionError>> {
        loop {
            let msg = self.stream.next().await?;
            if msg.is_ok() {
                self.awaiting_pong = false;
            }

            match msg {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => tracing::debug!("Ignoring non-UTF-8 binary frame"),
                },
                Ok(Message::Ping(data)) => {
                    if let Err(e) = self.stream.send(Message::Pong(data)).await {
                        return Some(Err(ConnectionError::SendFailed(e.to_string())));
                    }
                }
                Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                Ok(Message::Close(frame)) => {
                    tracing::info!(frame = ?frame, "Received close frame");
                    return None;
                }
                Err(e) => return Some(Err(ConnectionError::Protocol(e.to_string()))),
            }
        }
    }

    async fn ping(&mut self) -> Result<(), ConnectionError> {
        if self.awaiting_pong {
            return Err(ConnectionError::PongTimeout);
        }
        self.stream
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| ConnectionError::SendFailed(e.to_string()))?;
        self.awaiting_pong = true;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "Error while closing WebSocket");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_ws_connector_creation() {
        let connector = WsConnector::with_url("wss://example.com");
        assert_eq!(connector.url(), "wss://example.com");
    }

    #[test]
    fn test_stream_url() {
        let connector = WsConnector::with_url("wss://fstream.binance.com/");
        let url = connector.stream_url(&[
            "btcusdt@depth20@100ms".to_string(),
            "ethusdt@depth20@100ms".to_string(),
        ]);
        assert_eq!(
            url,
            "wss://fstream.binance.com/stream?streams=btcusdt@depth20@100ms/ethusdt@depth20@100ms"
        );
    }

    #[tokio::test]
    async fn test_ws_connector_connection_failure() {
        let connector = WsConnector::new(
            WsConfig::new("ws://127.0.0.1:9").connect_timeout(Duration::from_secs(2)),
        );
        let result = connector.connect(&["btcusdt@depth20@100ms".to_string()]).await;
        assert!(matches!(
            result,
            Err(ConnectionError::ConnectFailed(_)) | Err(ConnectionError::Timeout)
        ));
    }
}
