//! Binance futures `exchangeInfo` client

use super::{DiscoveryError, Symbol, SymbolUniverse};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

/// Binance USDⓈ-M futures REST base URL
pub const BINANCE_FAPI_URL: &str = "https://fapi.binance.com";

/// Configuration for the exchange metadata client
#[derive(Debug, Clone)]
pub struct ExchangeInfoConfig {
    /// REST base URL
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Quote asset filter (e.g., "USDT")
    pub quote_asset: String,
    /// Contract type filter
    pub contract_type: String,
    /// Keep at most this many symbols (0 = no limit)
    pub limit: usize,
}

impl Default for ExchangeInfoConfig {
    fn default() -> Self {
        Self {
            base_url: BINANCE_FAPI_URL.to_string(),
            timeout: Duration::from_secs(15),
            quote_asset: "USDT".to_string(),
            contract_type: "PERPETUAL".to_string(),
            limit: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    quote_asset: Option<String>,
    #[serde(default)]
    contract_type: Option<String>,
}

/// Discovers tradable perpetual contracts from `/fapi/v1/exchangeInfo`
pub struct ExchangeInfoClient {
    config: ExchangeInfoConfig,
    client: Client,
}

impl ExchangeInfoClient {
    /// Create a client with the given configuration
    pub fn new(config: ExchangeInfoConfig) -> Result<Self, DiscoveryError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Filter an `exchangeInfo` body down to the configured universe
    fn parse_symbols(&self, body: &str) -> Result<Vec<Symbol>, DiscoveryError> {
        let info: ExchangeInfo = serde_json::from_str(body)?;

        let symbols: BTreeSet<Symbol> = info
            .symbols
            .into_iter()
            .filter(|s| s.status.as_deref() == Some("TRADING"))
            .filter(|s| s.quote_asset.as_deref() == Some(self.config.quote_asset.as_str()))
            .filter(|s| s.contract_type.as_deref() == Some(self.config.contract_type.as_str()))
            .map(|s| Symbol::new(s.symbol))
            .collect();

        let mut symbols: Vec<Symbol> = symbols.into_iter().collect();
        if self.config.limit > 0 {
            symbols.truncate(self.config.limit);
        }
        Ok(symbols)
    }
}

#[async_trait]
impl SymbolUniverse for ExchangeInfoClient {
    async fn discover(&self) -> Result<Vec<Symbol>, DiscoveryError> {
        let url = format!("{}/fapi/v1/exchangeInfo", self.config.base_url);
        tracing::debug!(url = %url, "Fetching exchange metadata");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Status { status, body });
        }

        let body = response.text().await?;
        let symbols = self.parse_symbols(&body)?;

        tracing::info!(
            count = symbols.len(),
            quote = %self.config.quote_asset,
            contract = %self.config.contract_type,
            "Discovered symbol universe"
        );

        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "timezone": "UTC",
        "symbols": [
            {"symbol": "ETHUSDT", "status": "TRADING", "quoteAsset": "USDT", "contractType": "PERPETUAL"},
            {"symbol": "BTCUSDT", "status": "TRADING", "quoteAsset": "USDT", "contractType": "PERPETUAL"},
            {"symbol": "BTCUSDT_240329", "status": "TRADING", "quoteAsset": "USDT", "contractType": "CURRENT_QUARTER"},
            {"symbol": "ETHBTC", "status": "TRADING", "quoteAsset": "BTC", "contractType": "PERPETUAL"},
            {"symbol": "LUNAUSDT", "status": "SETTLING", "quoteAsset": "USDT", "contractType": "PERPETUAL"},
            {"symbol": "BTCUSDT", "status": "TRADING", "quoteAsset": "USDT", "contractType": "PERPETUAL"}
        ]
    }"#;

    #[test]
    fn test_parse_filters_and_sorts() {
        let client = ExchangeInfoClient::new(ExchangeInfoConfig::default()).unwrap();
        let symbols = client.parse_symbols(BODY).unwrap();
        assert_eq!(symbols, vec![Symbol::new("BTCUSDT"), Symbol::new("ETHUSDT")]);
    }

    #[test]
    fn test_parse_respects_limit() {
        let config = ExchangeInfoConfig {
            limit: 1,
            ..Default::default()
        };
        let client = ExchangeInfoClient::new(config).unwrap();
        let symbols = client.parse_symbols(BODY).unwrap();
        assert_eq!(symbols, vec![Symbol::new("BTCUSDT")]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let client = ExchangeInfoClient::new(ExchangeInfoConfig::default()).unwrap();
        let result = client.parse_symbols("<html>maintenance</html>");
        assert!(matches!(result, Err(DiscoveryError::Parse(_))));
    }

    #[tokio::test]
    async fn test_discover_unreachable_endpoint() {
        let config = ExchangeInfoConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let client = ExchangeInfoClient::new(config).unwrap();
        assert!(matches!(
            client.discover().await,
            Err(DiscoveryError::Request(_))
        ));
    }
}
