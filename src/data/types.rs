//! Normalized row types written to the store

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A row that can be buffered and upserted into a store table
pub trait Record: Serialize + Clone + Send + Sync + 'static {
    /// Destination table name
    const TABLE: &'static str;
    /// Columns forming the natural key used for idempotent upserts
    const CONFLICT_COLUMNS: &'static [&'static str];

    /// Natural key rendered as a single string, unique per logical row
    fn natural_key(&self) -> String;

    /// Exchange-supplied event time
    fn event_time(&self) -> DateTime<Utc>;
}

/// Book side of a depth level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub const fn as_str(self) -> &'static str {
        match self {
            Side::Bid => "BID",
            Side::Ask => "ASK",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One price level of an order-book depth snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthRow {
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    /// 1-based position of the level within its side
    pub depth_rank: u16,
    pub event_time: DateTime<Utc>,
}

impl Record for DepthRow {
    const TABLE: &'static str = "binance_orderbook";
    const CONFLICT_COLUMNS: &'static [&'static str] =
        &["symbol", "side", "depth_rank", "event_time"];

    fn natural_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.symbol,
            self.side,
            self.depth_rank,
            self.event_time.timestamp_millis()
        )
    }

    fn event_time(&self) -> DateTime<Utc> {
        self.event_time
    }
}

/// Direction of a forced liquidation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("BUY"),
            OrderSide::Sell => f.write_str("SELL"),
        }
    }
}

/// A forced-liquidation order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationRow {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: Option<String>,
    pub status: Option<String>,
    pub price: Decimal,
    pub avg_price: Decimal,
    pub quantity: Decimal,
    pub event_time: DateTime<Utc>,
}

impl Record for LiquidationRow {
    const TABLE: &'static str = "binance_liquidations";
    const CONFLICT_COLUMNS: &'static [&'static str] = &["symbol", "side", "event_time"];

    fn natural_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.symbol,
            self.side,
            self.event_time.timestamp_millis()
        )
    }

    fn event_time(&self) -> DateTime<Utc> {
        self.event_time
    }
}
