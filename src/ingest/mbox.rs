//! Streaming MBOX splitter.
//!
//! Reads the file line by line through a buffered reader and hands each
//! complete message to a callback. Tolerant of CRLF line endings, a UTF-8
//! BOM, `From ` separators without a preceding blank line, and oversized
//! messages (truncated with a warning).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{InboxError, Result};

const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Report progress at most every this many bytes.
const PROGRESS_INTERVAL: u64 = 1024 * 1024;

/// Splits an MBOX file into raw messages.
pub struct MboxReader {
    path: PathBuf,
    file_size: u64,
    max_message_size: usize,
}

impl MboxReader {
    /// Prepare to read `path`. Fails if the file does not exist.
    pub fn new(path: impl AsRef<Path>, max_message_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| InboxError::io(&path, e))?;
        Ok(Self {
            path,
            file_size: metadata.len(),
            max_message_size,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Call `on_message(offset, raw)` for every message, in file order.
    ///
    /// `raw` includes the `From ` separator line. Returning `false` from the
    /// callback stops reading. Returns the number of messages delivered.
    pub fn for_each_message(
        &self,
        on_message: &mut dyn FnMut(u64, &[u8]) -> bool,
        progress: Option<&dyn Fn(u64, u64)>,
    ) -> Result<u64> {
        if self.file_size == 0 {
            return Ok(0);
        }

        let file = File::open(&self.path).map_err(|e| InboxError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut line: Vec<u8> = Vec::with_capacity(4096);
        let mut message: Vec<u8> = Vec::with_capacity(64 * 1024);
        let mut message_start: u64 = 0;
        let mut offset: u64 = 0;
        let mut last_progress: u64 = 0;
        let mut prev_blank = true;
        let mut truncated = false;
        let mut delivered: u64 = 0;

        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| InboxError::io(&self.path, e))?;
            if read == 0 {
                break;
            }

            if is_separator(&line, offset == 0) {
                if !prev_blank && offset != 0 {
                    warn!(offset, "Found 'From ' separator without preceding blank line");
                }
                if !message.is_empty() {
                    if !on_message(message_start, &message) {
                        return Ok(delivered);
                    }
                    delivered += 1;
                }
                message.clear();
                message_start = offset;
                truncated = false;
            }

            if message.len() + line.len() <= self.max_message_size {
                message.extend_from_slice(&line);
            } else if !truncated {
                warn!(
                    offset = message_start,
                    max_size = self.max_message_size,
                    "Message exceeds maximum size, truncating"
                );
                truncated = true;
            }

            prev_blank = is_blank(&line);
            offset += read as u64;

            if let Some(cb) = progress {
                if offset - last_progress >= PROGRESS_INTERVAL {
                    cb(offset, self.file_size);
                    last_progress = offset;
                }
            }
        }

        if !message.is_empty() && on_message(message_start, &message) {
            delivered += 1;
        }
        if let Some(cb) = progress {
            cb(self.file_size, self.file_size);
        }
        Ok(delivered)
    }
}

/// `From ` at the start of a line. The very first line may carry a BOM.
fn is_separator(line: &[u8], first_line: bool) -> bool {
    let line = if first_line {
        line.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(line)
    } else {
        line
    };
    line.starts_with(b"From ")
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| matches!(b, b'\n' | b'\r' | b' ' | b'\t'))
}
