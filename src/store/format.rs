//! Binary record-store file format.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ HEADER (64 bytes, fixed)             │
//! │  magic: [u8; 8] = b"INBXRUL\0"       │
//! │  version: u32                        │
//! │  flags: u32                          │
//! │  record_count: u64                   │
//! │  payload_sha256: [u8; 32]            │
//! │  (padding to 64 bytes)               │
//! ├──────────────────────────────────────┤
//! │ PAYLOAD (variable)                   │
//! │  bincode-serialized Vec<EmailRecord> │
//! └──────────────────────────────────────┘
//! ```

use sha2::{Digest, Sha256};

/// Magic bytes identifying a record store.
pub const MAGIC: &[u8; 8] = b"INBXRUL\0";

/// Current store format version.
pub const VERSION: u32 = 1;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 64;

/// Serializable store header.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct StoreHeader {
    /// Magic bytes (must equal [`MAGIC`]).
    pub magic: [u8; 8],
    /// Format version (must equal [`VERSION`]).
    pub version: u32,
    /// Reserved flags (currently unused).
    pub flags: u32,
    /// Number of records in the payload.
    pub record_count: u64,
    /// SHA-256 of the payload bytes.
    pub payload_sha256: [u8; 32],
}

impl StoreHeader {
    /// Header describing `payload`.
    pub fn for_payload(payload: &[u8], record_count: u64) -> Self {
        Self {
            magic: *MAGIC,
            version: VERSION,
            flags: 0,
            record_count,
            payload_sha256: payload_hash(payload),
        }
    }

    /// Validate that the header is well-formed and matches the current format.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.magic != *MAGIC {
            return Err("Invalid magic bytes".into());
        }
        if self.version != VERSION {
            return Err(format!(
                "Incompatible version: expected {VERSION}, found {}",
                self.version
            ));
        }
        Ok(())
    }

    /// Check the payload against the recorded hash.
    pub fn verify_payload(&self, payload: &[u8]) -> std::result::Result<(), String> {
        if payload_hash(payload) != self.payload_sha256 {
            return Err("Payload checksum mismatch".into());
        }
        Ok(())
    }
}

fn payload_hash(payload: &[u8]) -> [u8; 32] {
    Sha256::digest(payload).into()
}
