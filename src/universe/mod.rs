//! Symbol universe discovery
//!
//! Resolves the set of instruments to subscribe to, either from the exchange
//! metadata endpoint or from a fixed list in configuration.

mod exchange_info;

pub use exchange_info::{ExchangeInfoClient, ExchangeInfoConfig, BINANCE_FAPI_URL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A tradable instrument identifier, normalized to upper case
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Self(symbol.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-case form used in stream names
    pub fn stream_name(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Failure to resolve the symbol universe at startup
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("metadata endpoint unreachable: {0}")]
    Request(#[from] reqwest::Error),
    #[error("metadata endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unparseable metadata payload: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Source of the instruments to stream
#[async_trait]
pub trait SymbolUniverse: Send + Sync {
    /// Discover the ordered, de-duplicated set of symbols
    async fn discover(&self) -> Result<Vec<Symbol>, DiscoveryError>;
}

/// A fixed symbol list, bypassing the metadata endpoint
#[derive(Debug, Clone)]
pub struct StaticUniverse {
    symbols: Vec<Symbol>,
}

impl StaticUniverse {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut symbols: Vec<Symbol> = symbols
            .into_iter()
            .map(Symbol::new)
            .filter(|s| !s.as_str().is_empty())
            .collect();
        symbols.sort();
        symbols.dedup();
        Self { symbols }
    }
}

#[async_trait]
impl SymbolUniverse for StaticUniverse {
    async fn discover(&self) -> Result<Vec<Symbol>, DiscoveryError> {
        Ok(self.symbols.clone())
    }
}
