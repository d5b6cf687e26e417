//! On-disk document store format.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ HEADER (128 bytes, fixed)            │
//! │  magic: [u8; 8] = b"MTRAIL\0\0"      │
//! │  version: u32                        │
//! │  flags: u32                          │
//! │  document_count: u64                 │
//! │  dimension: u32                      │
//! │  model_fingerprint: [u8; 32]         │
//! │  payload_sha256: [u8; 32]            │
//! │  (padding to 128 bytes)              │
//! ├──────────────────────────────────────┤
//! │ PAYLOAD (variable)                   │
//! │  bincode-serialized Vec<StoredEntry> │
//! └──────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::document::IndexedDocument;

/// Magic bytes identifying a mailtrail store file.
pub const MAGIC: &[u8; 8] = b"MTRAIL\0\0";

/// Current store format version.
pub const VERSION: u32 = 1;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 128;

/// File name of the store inside its directory.
pub const STORE_FILE_NAME: &str = "documents.mtstore";

/// Serializable store header.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreHeader {
    pub magic: [u8; 8],
    pub version: u32,
    /// Reserved.
    pub flags: u32,
    pub document_count: u64,
    /// Embedding length, `0` while the store is empty.
    pub dimension: u32,
    /// SHA-256 of the embedding model name.
    pub model_fingerprint: [u8; 32],
    /// SHA-256 of the payload bytes.
    pub payload_sha256: [u8; 32],
}

impl StoreHeader {
    /// Check magic bytes and format version.
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
}

/// One stored document with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: u64,
    pub document: IndexedDocument,
    pub vector: Vec<f32>,
}

/// SHA-256 of an embedding model name.
pub fn model_fingerprint(model_name: &str) -> [u8; 32] {
    Sha256::digest(model_name.as_bytes()).into()
}

/// SHA-256 of arbitrary bytes.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> StoreHeader {
        StoreHeader {
            magic: *MAGIC,
            version: VERSION,
            flags: 0,
            document_count: 3,
            dimension: 384,
            model_fingerprint: model_fingerprint("all-minilm"),
            payload_sha256: sha256(b"payload"),
        }
    }

    #[test]
    fn test_header_fits_fixed_size() {
        let bytes = bincode::serialize(&header()).unwrap();
        assert!(bytes.len() <= HEADER_SIZE);
    }

    #[test]
    fn test_header_validate() {
        assert!(header().validate().is_ok());

        let mut bad_magic = header();
        bad_magic.magic = *b"MBOXTUI\0";
        assert!(bad_magic.validate().is_err());

        let mut bad_version = header();
        bad_version.version = VERSION + 1;
        assert!(bad_version.validate().unwrap_err().contains("Incompatible version"));
    }

    #[test]
    fn test_fingerprint_differs_per_model() {
        assert_ne!(model_fingerprint("all-minilm"), model_fingerprint("nomic-embed-text"));
        assert_eq!(model_fingerprint("a"), model_fingerprint("a"));
    }
}
