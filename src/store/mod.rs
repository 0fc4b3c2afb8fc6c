//! Persistence for normalized rows
//!
//! Writes are upserts on each table's natural key, so replaying a batch is
//! harmless. [`PostgrestStore`] talks to a Supabase/PostgREST endpoint;
//! [`MemoryStore`] has the same semantics in-process.

mod memory;
mod postgrest;

pub use memory::MemoryStore;
pub use postgrest::{PostgrestConfig, PostgrestStore};

use crate::data::Record;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use thiserror::Error;

/// The store client could not be built
#[derive(Debug, Error)]
pub enum StoreInitError {
    #[error("store key is not a valid HTTP header value")]
    InvalidKey,
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A batch write was rejected
#[derive(Debug, Error)]
pub enum StoreWriteError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("store rejected write to {table}: HTTP {status}: {body}")]
    Rejected {
        table: &'static str,
        status: u16,
        body: String,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A retention delete failed
#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("store rejected delete on {table}: HTTP {status}: {body}")]
    Rejected {
        table: &'static str,
        status: u16,
        body: String,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Reading the freshest persisted row failed
#[derive(Debug, Error)]
pub enum StoreReadError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("store rejected read on {table}: HTTP {status}: {body}")]
    Rejected {
        table: &'static str,
        status: u16,
        body: String,
    },
    #[error("unexpected response body: {0}")]
    Parse(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable destination for rows
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Insert or overwrite rows keyed on [`Record::CONFLICT_COLUMNS`]
    async fn upsert<R: Record>(&self, rows: &[R]) -> Result<(), StoreWriteError>;

    /// Delete every row of `table` with `event_time < cutoff`; returns the count
    async fn delete_before(
        &self,
        table: &'static str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RetentionError>;

    /// Event time of the most recent row in `table`, if any
    async fn latest_event_time(
        &self,
        table: &'static str,
    ) -> Result<Option<DateTime<Utc>>, StoreReadError>;
}

/// Keep only the last row per natural key, preserving first-seen order.
///
/// A single upsert statement may not touch the same key twice.
pub(crate) fn dedup_by_key<R: Record>(rows: &[R]) -> Vec<&R> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut out: Vec<&R> = Vec::with_capacity(rows.len());

    for row in rows {
        match index.entry(row.natural_key()) {
            Entry::Occupied(slot) => out[*slot.get()] = row,
            Entry::Vacant(slot) => {
                slot.insert(out.len());
                out.push(row);
            }
        }
    }
    out
}
