//! Record store persisted to a single binary file.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{InboxError, Result};
use crate::model::EmailRecord;
use crate::store::format::{StoreHeader, HEADER_SIZE};

use super::{RecordStore, UpsertSummary};

/// Records kept in memory and rewritten to disk after every upsert.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    records: Vec<EmailRecord>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store; a
    /// corrupt one is an error (its contents are never discarded silently).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = if path.exists() {
            read_records(&path)?
        } else {
            debug!(path = %path.display(), "No record store yet, starting empty");
            Vec::new()
        };
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Size of the store file on disk (0 if not written yet).
    pub fn file_size(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| InboxError::io(parent, e))?;
            }
        }

        let payload = bincode::serialize(&self.records)
            .map_err(|e| InboxError::Serialization(e.to_string()))?;
        let header = StoreHeader::for_payload(&payload, self.records.len() as u64);
        let mut header_bytes = bincode::serialize(&header)
            .map_err(|e| InboxError::Serialization(e.to_string()))?;
        header_bytes.resize(HEADER_SIZE, 0);

        let tmp = self.path.with_extension("db.tmp");
        let mut file = File::create(&tmp).map_err(|e| InboxError::io(&tmp, e))?;
        file.write_all(&header_bytes)
            .and_then(|_| file.write_all(&payload))
            .and_then(|_| file.sync_all())
            .map_err(|e| InboxError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| InboxError::io(&self.path, e))?;

        debug!(
            path = %self.path.display(),
            records = self.records.len(),
            "Wrote record store"
        );
        Ok(())
    }
}

impl RecordStore for FileStore {
    fn fetch_all(&self) -> Result<Vec<EmailRecord>> {
        Ok(self.records.clone())
    }

    fn upsert(&mut self, records: Vec<EmailRecord>) -> Result<UpsertSummary> {
        let summary = merge_records(&mut self.records, records);
        self.write()?;
        info!(
            path = %self.path.display(),
            inserted = summary.inserted,
            updated = summary.updated,
            "Stored records"
        );
        Ok(summary)
    }
}

/// Merge `incoming` into `existing` by id: replace in place, append new ids.
pub(crate) fn merge_records(
    existing: &mut Vec<EmailRecord>,
    incoming: Vec<EmailRecord>,
) -> UpsertSummary {
    let mut positions: HashMap<String, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.clone(), i))
        .collect();
    let mut summary = UpsertSummary::default();

    for record in incoming {
        match positions.get(&record.id) {
            Some(&i) => {
                existing[i] = record;
                summary.updated += 1;
            }
            None => {
                positions.insert(record.id.clone(), existing.len());
                existing.push(record);
                summary.inserted += 1;
            }
        }
    }
    summary
}

fn read_records(path: &Path) -> Result<Vec<EmailRecord>> {
    let invalid = |reason: String| InboxError::InvalidStore {
        path: path.to_path_buf(),
        reason,
    };

    let data = std::fs::read(path).map_err(|e| InboxError::io(path, e))?;
    if data.len() < HEADER_SIZE {
        return Err(invalid("File too small".into()));
    }

    let header: StoreHeader = bincode::deserialize(&data[..HEADER_SIZE])
        .map_err(|e| invalid(format!("Header deserialization failed: {e}")))?;
    header.validate().map_err(invalid)?;

    let payload = &data[HEADER_SIZE..];
    header.verify_payload(payload).map_err(invalid)?;

    let records: Vec<EmailRecord> = bincode::deserialize(payload)
        .map_err(|e| invalid(format!("Payload deserialization failed: {e}")))?;
    if records.len() as u64 != header.record_count {
        return Err(invalid(format!(
            "Record count mismatch: header says {}, found {}",
            header.record_count,
            records.len()
        )));
    }

    debug!(path = %path.display(), count = records.len(), "Loaded record store");
    Ok(records)
}
