//! Fixed-capacity result buffer.
//!
//! Holds the records of the most recent query only. `reset` starts a new
//! generation, `append` fills up to capacity and then silently drops, and
//! `drain` hands records out in append order from a read cursor.

use ofs_common::{Error, Result, ResultRecord};

/// Default number of records one query can collect.
pub const DEFAULT_CAPACITY: usize = 256;

/// Records of the current query plus the read cursor.
///
/// Invariant: `cursor <= records.len() <= capacity`.
#[derive(Debug)]
pub struct ResultBuffer {
    capacity: usize,
    records: Vec<ResultRecord>,
    cursor: usize,
    generation: u64,
}

impl Default for ResultBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ResultBuffer {
    /// Create an empty, never-queried buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            records: Vec::with_capacity(capacity),
            cursor: 0,
            generation: 0,
        }
    }

    /// Discard all records and start a new generation.
    pub fn reset(&mut self) {
        self.records.clear();
        self.cursor = 0;
        self.generation += 1;
    }

    /// Store `record` at the end. Returns `false` without storing when full.
    pub fn append(&mut self, record: ResultRecord) -> bool {
        if self.is_full() {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Take up to `max` unread records, advancing the cursor.
    ///
    /// Fails with [`Error::NotReady`] if no query has ever reset the buffer.
    /// Once exhausted every call returns an empty vector.
    pub fn drain(&mut self, max: usize) -> Result<Vec<ResultRecord>> {
        if self.generation == 0 {
            return Err(Error::NotReady);
        }
        let take = max.min(self.remaining());
        let out = self.records[self.cursor..self.cursor + take].to_vec();
        self.cursor += take;
        Ok(out)
    }

    /// Records stored in this generation (`count`).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records not yet drained.
    pub fn remaining(&self) -> usize {
        self.records.len() - self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    /// Number of resets so far; 0 means never queried.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
