//! Row model and the in-memory buffer rows wait in before a flush

mod buffer;
mod types;

pub use buffer::Buffer;
pub use types::{DepthRow, LiquidationRow, OrderSide, Record, Side};
