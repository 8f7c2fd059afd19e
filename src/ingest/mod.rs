//! Loading messages from MBOX exports and `.eml` files into records.

pub mod mbox;
pub mod message;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{InboxError, Result};
use crate::model::EmailRecord;

pub use mbox::MboxReader;
pub use message::parse_message;

/// Default cap on messages taken per ingest.
pub const DEFAULT_MAX_MESSAGES: usize = 50;

/// Default per-message size limit (32 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Stop after this many records. `0` means no limit.
    pub max_messages: usize,
    /// Keep only messages carrying this label (case-insensitive).
    pub label_filter: Option<String>,
    /// Larger messages are truncated before parsing.
    pub max_message_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            label_filter: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl IngestOptions {
    fn accepts(&self, record: &EmailRecord) -> bool {
        match &self.label_filter {
            Some(wanted) => record.labels.iter().any(|l| l.eq_ignore_ascii_case(wanted)),
            None => true,
        }
    }

    fn is_full(&self, taken: usize) -> bool {
        self.max_messages != 0 && taken >= self.max_messages
    }
}

/// Result of an ingest run.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub records: Vec<EmailRecord>,
    /// Messages that could not be parsed.
    pub unparseable: usize,
    /// Messages dropped by the label filter.
    pub filtered: usize,
}

impl IngestReport {
    fn take(&mut self, raw: &[u8], options: &IngestOptions) {
        match parse_message(raw) {
            Some(record) if options.accepts(&record) => self.records.push(record),
            Some(record) => {
                debug!(id = %record.id, "Skipping message outside label filter");
                self.filtered += 1;
            }
            None => self.unparseable += 1,
        }
    }
}

/// Ingest several inputs in order, sharing one message limit.
pub fn ingest_paths(
    paths: &[PathBuf],
    options: &IngestOptions,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    for path in paths {
        if options.is_full(report.records.len()) {
            break;
        }
        ingest_into(path, options, progress, &mut report)?;
    }
    info!(
        records = report.records.len(),
        unparseable = report.unparseable,
        filtered = report.filtered,
        "Ingest complete"
    );
    Ok(report)
}

/// Ingest one MBOX file, `.eml` file, or directory of them.
pub fn ingest_path(
    path: impl AsRef<Path>,
    options: &IngestOptions,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<IngestReport> {
    ingest_paths(&[path.as_ref().to_path_buf()], options, progress)
}

fn ingest_into(
    path: &Path,
    options: &IngestOptions,
    progress: Option<&dyn Fn(u64, u64)>,
    report: &mut IngestReport,
) -> Result<()> {
    if !path.exists() {
        return Err(InboxError::FileNotFound(path.to_path_buf()));
    }

    if path.is_dir() {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(path)
            .map_err(|e| InboxError::io(path, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_mail_file(p))
            .collect();
        entries.sort();
        debug!(dir = %path.display(), files = entries.len(), "Ingesting directory");
        for entry in entries {
            if options.is_full(report.records.len()) {
                break;
            }
            ingest_into(&entry, options, progress, report)?;
        }
        return Ok(());
    }

    if has_extension(path, "eml") {
        let raw = std::fs::read(path).map_err(|e| InboxError::io(path, e))?;
        let before = report.unparseable;
        report.take(&raw, options);
        if report.unparseable > before {
            warn!(path = %path.display(), "Could not parse message file");
        }
        return Ok(());
    }

    let reader = MboxReader::new(path, options.max_message_size)?;
    reader.for_each_message(
        &mut |offset, raw| {
            let before = report.unparseable;
            report.take(raw, options);
            if report.unparseable > before {
                warn!(path = %path.display(), offset, "Could not parse message");
            }
            !options.is_full(report.records.len())
        },
        progress,
    )?;
    Ok(())
}

fn is_mail_file(path: &Path) -> bool {
    has_extension(path, "eml") || has_extension(path, "mbox")
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
