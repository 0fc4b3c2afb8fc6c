//! Shared row buffer between stream workers and the flusher

use parking_lot::Mutex;
use std::mem;

/// Thread-safe accumulator of rows awaiting persistence.
///
/// Any number of writers may call [`Buffer::append`] concurrently; the flusher
/// takes everything with [`Buffer::drain`]. Both operations hold the same lock
/// so a row is observed by exactly one drain.
#[derive(Debug)]
pub struct Buffer<R> {
    rows: Mutex<Vec<R>>,
}

impl<R> Buffer<R> {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }

    /// Append rows in order
    pub fn append(&self, rows: impl IntoIterator<Item = R>) {
        self.rows.lock().extend(rows);
    }

    /// Remove and return everything currently buffered
    pub fn drain(&self) -> Vec<R> {
        mem::take(&mut *self.rows.lock())
    }

    /// Number of buffered rows
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R> Default for Buffer<R> {
    fn default() -> Self {
        Self::new()
    }
}
