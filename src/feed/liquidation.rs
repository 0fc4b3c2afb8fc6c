//! Forced-liquidation (`forceOrder`) stream decoder

use super::types::{event_time_from_millis, parse_decimal, parse_frame, DecodeError, Frame};
use super::FeedDecoder;
use crate::data::{LiquidationRow, OrderSide};
use crate::universe::Symbol;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// All-market liquidation stream
pub const FORCE_ORDER_STREAM: &str = "!forceOrder@arr";

#[derive(Debug, Deserialize)]
struct ForceOrderPayload {
    #[serde(rename = "E")]
    event_time: i64,
    #[serde(rename = "o")]
    order: ForceOrder,
}

#[derive(Debug, Deserialize)]
struct ForceOrder {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "S")]
    side: String,
    #[serde(rename = "o", default)]
    order_type: Option<String>,
    #[serde(rename = "X", default)]
    status: Option<String>,
    #[serde(rename = "p", default)]
    price: Option<Value>,
    #[serde(rename = "ap", default)]
    avg_price: Option<Value>,
    #[serde(rename = "q", default)]
    quantity: Option<Value>,
}

/// Turns `forceOrder` events into liquidation rows.
///
/// The stream covers every market, so the subscription ignores the shard's
/// symbols.
#[derive(Debug, Clone, Default)]
pub struct LiquidationDecoder;

impl LiquidationDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// Missing amounts are recorded as zero; present but non-numeric ones fail
fn amount(field: &'static str, value: Option<&Value>) -> Result<Decimal, DecodeError> {
    match value {
        None | Some(Value::Null) => Ok(Decimal::ZERO),
        Some(Value::String(s)) if s.is_empty() => Ok(Decimal::ZERO),
        Some(v) => parse_decimal(v).ok_or_else(|| DecodeError::InvalidField {
            field,
            value: v.to_string(),
        }),
    }
}

impl FeedDecoder for LiquidationDecoder {
    type Record = LiquidationRow;

    fn name(&self) -> &'static str {
        "liquidations"
    }

    fn topics(&self, _symbols: &[Symbol]) -> Vec<String> {
        vec![FORCE_ORDER_STREAM.to_string()]
    }

    fn decode(&self, text: &str) -> Result<Vec<LiquidationRow>, DecodeError> {
        let data = match parse_frame(text)? {
            Frame::Control => return Ok(Vec::new()),
            Frame::Payload { data, .. } => data,
        };

        if data.get("e").and_then(Value::as_str) != Some("forceOrder") {
            return Ok(Vec::new());
        }

        let payload: ForceOrderPayload = serde_json::from_value(data)?;
        let order = payload.order;

        let side = match order.side.as_str() {
            "BUY" => OrderSide::Buy,
            "SELL" => OrderSide::Sell,
            other => {
                return Err(DecodeError::InvalidField {
                    field: "S",
                    value: other.to_string(),
                })
            }
        };

        Ok(vec![LiquidationRow {
            symbol: order.symbol.to_uppercase(),
            side,
            order_type: order.order_type,
            status: order.status,
            price: amount("p", order.price.as_ref())?,
            avg_price: amount("ap", order.avg_price.as_ref())?,
            quantity: amount("q", order.quantity.as_ref())?,
            event_time: event_time_from_millis(payload.event_time)?,
        }])
    }
}
