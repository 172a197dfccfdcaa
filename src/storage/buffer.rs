//! Write buffering in front of a record store
//!
//! Records are held in memory until either the batch threshold or the save
//! interval is reached, then written as one unit. A failed write keeps the
//! batch so the next flush retries it.

use crate::storage::traits::{RecordStore, StorageResult};
use crate::storage::Record;
use std::time::{Duration, Instant};

/// Ordered records not yet persisted
#[derive(Debug)]
pub struct FlushBuffer {
    records: Vec<Record>,
    threshold: usize,
    interval: Duration,
    last_flush: Instant,
}

impl FlushBuffer {
    pub fn new(threshold: usize, interval: Duration) -> Self {
        Self {
            records: Vec::with_capacity(threshold),
            threshold: threshold.max(1),
            interval,
            last_flush: Instant::now(),
        }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// True when a non-empty buffer hit the size threshold or the interval
    pub fn should_flush(&self, now: Instant) -> bool {
        if self.records.is_empty() {
            return false;
        }
        self.records.len() >= self.threshold
            || now.duration_since(self.last_flush) >= self.interval
    }

    /// Clears the buffer after a successful write
    fn mark_flushed(&mut self, now: Instant) {
        self.records.clear();
        self.last_flush = now;
    }
}

/// A record store paired with its write buffer
pub struct BufferedStore<S: RecordStore> {
    store: S,
    buffer: FlushBuffer,
}

impl<S: RecordStore> BufferedStore<S> {
    pub fn new(store: S, threshold: usize, interval: Duration) -> Self {
        Self {
            store,
            buffer: FlushBuffer::new(threshold, interval),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Buffers a record and flushes when the buffer is due
    ///
    /// Returns the number of rows written, zero when nothing was flushed.
    pub fn push(&mut self, record: Record) -> StorageResult<usize> {
        self.buffer.push(record);
        if self.buffer.should_flush(Instant::now()) {
            self.flush()
        } else {
            Ok(0)
        }
    }

    /// Writes every buffered record, as one unit
    pub fn flush(&mut self) -> StorageResult<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        let written = self.store.append(self.buffer.records())?;
        self.buffer.mark_flushed(Instant::now());
        tracing::debug!("Flushed {} records", written);
        Ok(written)
    }
}
