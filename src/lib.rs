//! depth-ingest: sharded streaming ingestion of Binance futures feeds
//!
//! This library provides the core components for:
//! - Symbol universe discovery from exchange metadata
//! - Partitioning symbols into fixed-size subscription shards
//! - Per-shard WebSocket workers with reconnect backoff and keepalive
//! - Decoding depth snapshots and forced liquidations into rows
//! - Buffered, retried batch upserts to a PostgREST store
//! - Freshness monitoring and age-based retention
//! - Logging and Prometheus metrics

pub mod cli;
pub mod config;
pub mod data;
pub mod engine;
pub mod feed;
pub mod shard;
pub mod store;
pub mod telemetry;
pub mod universe;
pub mod worker;
pub mod ws;
