//! Upstream feed decoding
//!
//! Each feed knows which topics to subscribe to for a shard and how to turn
//! an inbound text frame into normalized rows.

mod depth;
mod liquidation;
mod types;

pub use depth::{DepthDecoder, DEFAULT_DEPTH_STREAM, DEFAULT_TOP_K, MAX_TOP_K};
pub use liquidation::{LiquidationDecoder, FORCE_ORDER_STREAM};
pub use types::DecodeError;

use crate::data::Record;
use crate::universe::Symbol;

/// Decoder for one kind of push feed
pub trait FeedDecoder: Send + Sync + 'static {
    /// Row type produced by this feed
    type Record: Record;

    /// Short feed label used in logs and metrics
    fn name(&self) -> &'static str;

    /// Subscription topics for a shard's symbols
    fn topics(&self, symbols: &[Symbol]) -> Vec<String>;

    /// Decode one inbound text frame into zero or more rows
    fn decode(&self, text: &str) -> Result<Vec<Self::Record>, DecodeError>;
}
