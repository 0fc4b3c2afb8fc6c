//! Shared wire types and decoding helpers

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Failure to decode a single inbound message
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid event time {0}")]
    InvalidTimestamp(i64),
    #[error("invalid value for `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// A parsed inbound text frame
#[derive(Debug)]
pub(crate) enum Frame {
    /// Subscription acknowledgement or other control reply
    Control,
    /// Event payload, with the stream name when it came through the
    /// combined-stream envelope
    Payload { stream: Option<String>, data: Value },
}

/// Unwrap the `{"stream": ..., "data": ...}` envelope if present
pub(crate) fn parse_frame(text: &str) -> Result<Frame, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut map) = value else {
        return Err(DecodeError::NotAnObject);
    };

    if let Some(data) = map.remove("data") {
        let stream = map
            .remove("stream")
            .and_then(|s| s.as_str().map(str::to_string));
        return Ok(Frame::Payload { stream, data });
    }

    if map.contains_key("result") && map.contains_key("id") {
        return Ok(Frame::Control);
    }

    Ok(Frame::Payload {
        stream: None,
        data: Value::Object(map),
    })
}

/// Convert an exchange timestamp in milliseconds to UTC
pub(crate) fn event_time_from_millis(ms: i64) -> Result<DateTime<Utc>, DecodeError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(DecodeError::InvalidTimestamp(ms))
}

/// Parse a decimal sent either as a JSON string or a JSON number
pub(crate) fn parse_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Parse a `[price, quantity]` level
pub(crate) fn parse_level(value: &Value) -> Option<(Decimal, Decimal)> {
    let pair = value.as_array()?;
    let price = parse_decimal(pair.first()?)?;
    let quantity = parse_decimal(pair.get(1)?)?;
    Some((price, quantity))
}

/// Symbol prefix of a stream name (`btcusdt@depth20@100ms` -> `BTCUSDT`)
pub(crate) fn symbol_from_stream(stream: &str) -> Option<String> {
    stream
        .split('@')
        .next()
        .filter(|s| !s.is_empty() && !s.starts_with('!'))
        .map(str::to_uppercase)
}
