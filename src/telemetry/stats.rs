//! In-process ingestion counters
//!
//! Mirrors the Prometheus counters so health can be inspected from code.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one pipeline
#[derive(Debug, Default)]
pub struct IngestStats {
    messages_received: AtomicU64,
    decode_errors: AtomicU64,
    rows_appended: AtomicU64,
    rows_flushed: AtomicU64,
    batches_dropped: AtomicU64,
    rows_dropped: AtomicU64,
    reconnects: AtomicU64,
    retention_deleted: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub messages_received: u64,
    pub decode_errors: u64,
    pub rows_appended: u64,
    pub rows_flushed: u64,
    pub batches_dropped: u64,
    pub rows_dropped: u64,
    pub reconnects: u64,
    pub retention_deleted: u64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rows_appended(&self, n: u64) {
        self.rows_appended.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_rows_flushed(&self, n: u64) {
        self.rows_flushed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_batch_dropped(&self, rows: u64) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
        self.rows_dropped.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retention_deleted(&self, n: u64) {
        self.retention_deleted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            rows_appended: self.rows_appended.load(Ordering::Relaxed),
            rows_flushed: self.rows_flushed.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            rows_dropped: self.rows_dropped.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            retention_deleted: self.retention_deleted.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_updates() {
        let stats = IngestStats::new();
        stats.record_message();
        stats.record_message();
        stats.record_rows_appended(40);
        stats.record_batch_dropped(12);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.rows_appended, 40);
        assert_eq!(snapshot.batches_dropped, 1);
        assert_eq!(snapshot.rows_dropped, 12);
        assert_eq!(snapshot.decode_errors, 0);
    }
}
