//! Fingerprints for change detection.
//!
//! A fingerprint is either a streaming SHA-256 of the file contents or its
//! modification time in whole seconds, depending on the active comparison
//! mode. Exactly one field is populated; the other stays `None`.

use crate::config::ComparisonMode;
use crate::error::{RekrakeError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Chunk size for streaming file reads.
const CHUNK_SIZE: usize = 1024 * 1024;

/// Last-known optimization state of one file.
///
/// Two fingerprints are equal iff their populated fields match exactly
/// (string equality for the hash, integer equality for the timestamp).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Fingerprint {
    /// SHA-256 of the file contents as lowercase hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Modification time, whole seconds since epoch (UTC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<i64>,
}

impl Fingerprint {
    /// Capture the fingerprint field tracked by `mode` for the file at
    /// `path`. `ComparisonMode::None` still records a content hash so a
    /// later run in hash mode can recognize the file as unchanged.
    pub fn capture(path: impl AsRef<Path>, mode: ComparisonMode) -> Result<Self> {
        let path = path.as_ref();
        match mode {
            ComparisonMode::Timestamp => Ok(Self {
                hash: None,
                mtime: Some(modified_seconds(path)?),
            }),
            ComparisonMode::Hash | ComparisonMode::None => Ok(Self {
                hash: Some(content_hash(path)?),
                mtime: None,
            }),
        }
    }
}

/// Compute a streaming SHA-256 of the file at `path` as lowercase hex.
pub fn content_hash(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| RekrakeError::io_with_path(e, path))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| RekrakeError::io_with_path(e, path))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Read the modification time of `path` as whole seconds since epoch.
pub fn modified_seconds(path: impl AsRef<Path>) -> Result<i64> {
    let path = path.as_ref();
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| RekrakeError::io_with_path(e, path))?;

    match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => Ok(d.as_secs() as i64),
        // Pre-epoch mtimes happen on badly restored archives
        Err(e) => Ok(-(e.duration().as_secs() as i64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_content_hash_empty_file() {
        let file = NamedTempFile::new().unwrap();
        // SHA-256 of the empty string
        assert_eq!(
            content_hash(file.path()).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_content_hash_is_stable() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"jpeg bytes").unwrap();
        file.flush().unwrap();

        let first = content_hash(file.path()).unwrap();
        let second = content_hash(file.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_capture_populates_one_field() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"content").unwrap();
        file.flush().unwrap();

        let by_hash = Fingerprint::capture(file.path(), ComparisonMode::Hash).unwrap();
        assert!(by_hash.hash.is_some());
        assert!(by_hash.mtime.is_none());

        let by_time = Fingerprint::capture(file.path(), ComparisonMode::Timestamp).unwrap();
        assert!(by_time.hash.is_none());
        assert!(by_time.mtime.is_some());
    }

    #[test]
    fn test_fingerprint_equality() {
        let a = Fingerprint {
            hash: Some("abc".into()),
            mtime: None,
        };
        let b = Fingerprint {
            hash: Some("abc".into()),
            mtime: None,
        };
        let c = Fingerprint {
            hash: Some("abd".into()),
            mtime: None,
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fingerprint_serde_skips_absent_field() {
        let fp = Fingerprint {
            hash: Some("abc".into()),
            mtime: None,
        };
        let json = serde_json::to_string(&fp).unwrap();
        assert!(!json.contains("mtime"));

        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fp);
    }
}
