//! In-process store with upsert semantics
//!
//! Backs `run --dry-run` and the test suite. Failures can be injected to
//! exercise retry and fallback paths.

use super::{RetentionError, Store, StoreReadError, StoreWriteError};
use crate::data::Record;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

type Table = BTreeMap<String, (DateTime<Utc>, serde_json::Value)>;

/// Tables keyed by natural key
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<&'static str, Table>>,
    failing_writes: AtomicU64,
    write_attempts: AtomicU64,
    failing_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `n` upserts
    pub fn fail_next_writes(&self, n: u64) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    /// Make every freshness read fail until switched off
    pub fn fail_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    /// Upsert calls seen so far, including rejected ones
    pub fn write_attempts(&self) -> u64 {
        self.write_attempts.load(Ordering::SeqCst)
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, |t| t.len())
    }

    /// Stored rows of `table` as JSON, ordered by natural key
    pub fn rows(&self, table: &str) -> Vec<serde_json::Value> {
        self.tables
            .lock()
            .get(table)
            .map(|t| t.values().map(|(_, v)| v.clone()).collect())
            .unwrap_or_default()
    }

    /// Event times of `table`, ascending
    pub fn event_times(&self, table: &str) -> Vec<DateTime<Utc>> {
        let mut times: Vec<DateTime<Utc>> = self
            .tables
            .lock()
            .get(table)
            .map(|t| t.values().map(|(at, _)| *at).collect())
            .unwrap_or_default();
        times.sort();
        times
    }

    /// Consume one injected failure, if any are pending
    fn take_write_failure(&self) -> bool {
        self.failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert<R: Record>(&self, rows: &[R]) -> Result<(), StoreWriteError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.take_write_failure() {
            return Err(StoreWriteError::Unavailable("injected write failure".into()));
        }

        let mut encoded = Vec::with_capacity(rows.len());
        for row in rows {
            encoded.push((row.natural_key(), (row.event_time(), serde_json::to_value(row)?)));
        }

        let mut tables = self.tables.lock();
        let table = tables.entry(R::TABLE).or_default();
        table.extend(encoded);
        Ok(())
    }

    async fn delete_before(
        &self,
        table: &'static str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RetentionError> {
        let mut tables = self.tables.lock();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };

        let before = rows.len();
        rows.retain(|_, (at, _)| *at >= cutoff);
        Ok((before - rows.len()) as u64)
    }

    async fn latest_event_time(
        &self,
        table: &'static str,
    ) -> Result<Option<DateTime<Utc>>, StoreReadError> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(StoreReadError::Unavailable("injected read failure".into()));
        }

        Ok(self
            .tables
            .lock()
            .get(table)
            .and_then(|t| t.values().map(|(at, _)| *at).max()))
    }
}
