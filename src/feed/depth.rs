//! Partial book depth stream decoder

use super::types::{
    event_time_from_millis, parse_frame, parse_level, symbol_from_stream, DecodeError, Frame,
};
use super::FeedDecoder;
use crate::data::{DepthRow, Side};
use crate::universe::Symbol;
use serde::Deserialize;
use serde_json::Value;

/// Default number of levels kept per side
pub const DEFAULT_TOP_K: usize = 10;

/// Deepest book Binance serves; keeps `depth_rank` within `u16`
pub const MAX_TOP_K: usize = 1_000;

/// Default stream suffix: 20 levels pushed every 100ms
pub const DEFAULT_DEPTH_STREAM: &str = "depth20@100ms";

/// Depth update payload (`<symbol>@depth<levels>@<rate>`)
#[derive(Debug, Deserialize)]
struct DepthPayload {
    /// Event time (milliseconds)
    #[serde(rename = "E")]
    event_time: Option<i64>,
    /// Symbol
    #[serde(rename = "s")]
    symbol: Option<String>,
    /// Bid levels, best first
    #[serde(rename = "b", alias = "bids", default)]
    bids: Vec<Value>,
    /// Ask levels, best first
    #[serde(rename = "a", alias = "asks", default)]
    asks: Vec<Value>,
}

/// Turns depth updates into one row per level
#[derive(Debug, Clone)]
pub struct DepthDecoder {
    top_k: usize,
    stream: String,
}

impl DepthDecoder {
    /// Create a decoder keeping `top_k` levels per side of `stream` updates,
    /// capped at [`MAX_TOP_K`]
    pub fn new(top_k: usize, stream: impl Into<String>) -> Self {
        Self {
            top_k: top_k.min(MAX_TOP_K),
            stream: stream.into(),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    fn push_side(&self, rows: &mut Vec<DepthRow>, side: Side, levels: &[Value], base: &DepthRow) {
        for (index, level) in levels.iter().take(self.top_k).enumerate() {
            let Some((price, quantity)) = parse_level(level) else {
                tracing::trace!(symbol = %base.symbol, %side, rank = index + 1, "Skipping malformed level");
                continue;
            };
            rows.push(DepthRow {
                side,
                price,
                quantity,
                depth_rank: (index + 1) as u16,
                ..base.clone()
            });
        }
    }
}

impl Default for DepthDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K, DEFAULT_DEPTH_STREAM)
    }
}

impl FeedDecoder for DepthDecoder {
    type Record = DepthRow;

    fn name(&self) -> &'static str {
        "depth"
    }

    fn topics(&self, symbols: &[Symbol]) -> Vec<String> {
        symbols
            .iter()
            .map(|s| format!("{}@{}", s.stream_name(), self.stream))
            .collect()
    }

    fn decode(&self, text: &str) -> Result<Vec<DepthRow>, DecodeError> {
        let (stream, data) = match parse_frame(text)? {
            Frame::Control => return Ok(Vec::new()),
            Frame::Payload { stream, data } => (stream, data),
        };

        let payload: DepthPayload = serde_json::from_value(data)?;

        let event_time = payload
            .event_time
            .ok_or(DecodeError::MissingField("E"))
            .and_then(event_time_from_millis)?;

        let symbol = payload
            .symbol
            .map(|s| s.to_uppercase())
            .or_else(|| stream.as_deref().and_then(symbol_from_stream))
            .ok_or(DecodeError::MissingField("s"))?;

        let base = DepthRow {
            symbol,
            side: Side::Bid,
            price: Default::default(),
            quantity: Default::default(),
            depth_rank: 0,
            event_time,
        };

        let mut rows = Vec::with_capacity(self.top_k * 2);
        self.push_side(&mut rows, Side::Bid, &payload.bids, &base);
        self.push_side(&mut rows, Side::Ask, &payload.asks, &base);
        Ok(rows)
    }
}
