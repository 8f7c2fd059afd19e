//! Durable storage of ingested message records.

pub mod file;
pub mod format;

use crate::error::Result;
use crate::model::EmailRecord;

pub use file::FileStore;

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Records with a previously unseen id.
    pub inserted: usize,
    /// Records that replaced an existing one with the same id.
    pub updated: usize,
}

/// Persistence for [`EmailRecord`]s keyed by id.
pub trait RecordStore {
    /// Every stored record, in storage order.
    fn fetch_all(&self) -> Result<Vec<EmailRecord>>;

    /// Insert or replace records by id. The last write for an id wins.
    fn upsert(&mut self, records: Vec<EmailRecord>) -> Result<UpsertSummary>;
}

/// A store that lives only in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<EmailRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn fetch_all(&self) -> Result<Vec<EmailRecord>> {
        Ok(self.records.clone())
    }

    fn upsert(&mut self, records: Vec<EmailRecord>) -> Result<UpsertSummary> {
        Ok(file::merge_records(&mut self.records, records))
    }
}
