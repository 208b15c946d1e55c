//! Change detection against cached fingerprints.
//!
//! Decides whether a candidate file needs to be sent to the optimizer.
//! Pure read path: nothing here touches the network or mutates the
//! filesystem.

use crate::config::ComparisonMode;
use crate::error::Result;
use crate::fingerprint::{self, Fingerprint};
use std::path::Path;
use tracing::debug;

/// Outcome of comparing a file against its cached fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No fingerprint cached for this basename; always optimized.
    Unknown,
    /// Fingerprint mismatch (or comparison bypassed); re-optimized.
    Changed,
    /// Fingerprint matches; skipped entirely.
    Unchanged,
}

/// Decide whether `path` must go to the optimizer.
///
/// `Unknown` is returned for a missing cached fingerprint regardless of
/// mode. For known files, `ComparisonMode::None` bypasses comparison and
/// always yields `Changed`.
pub fn decide(
    path: impl AsRef<Path>,
    cached: Option<&Fingerprint>,
    mode: ComparisonMode,
) -> Result<Decision> {
    let path = path.as_ref();

    let Some(cached) = cached else {
        debug!("No cached fingerprint for {}", path.display());
        return Ok(Decision::Unknown);
    };

    let decision = match mode {
        ComparisonMode::None => Decision::Changed,
        ComparisonMode::Hash => {
            let current = fingerprint::content_hash(path)?;
            if cached.hash.as_deref() == Some(current.as_str()) {
                Decision::Unchanged
            } else {
                Decision::Changed
            }
        }
        ComparisonMode::Timestamp => {
            let current = fingerprint::modified_seconds(path)?;
            if cached.mtime == Some(current) {
                Decision::Unchanged
            } else {
                Decision::Changed
            }
        }
    };

    debug!("{} -> {:?} (mode {})", path.display(), decision, mode);
    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_missing_fingerprint_is_unknown_in_every_mode() {
        let file = file_with(b"image");
        for mode in [
            ComparisonMode::None,
            ComparisonMode::Hash,
            ComparisonMode::Timestamp,
        ] {
            assert_eq!(decide(file.path(), None, mode).unwrap(), Decision::Unknown);
        }
    }

    #[test]
    fn test_mode_none_always_changed_for_known_files() {
        let file = file_with(b"image");
        // Even a perfectly matching fingerprint is bypassed
        let cached = Fingerprint::capture(file.path(), ComparisonMode::Hash).unwrap();
        assert_eq!(
            decide(file.path(), Some(&cached), ComparisonMode::None).unwrap(),
            Decision::Changed
        );
    }

    #[test]
    fn test_hash_match_is_unchanged() {
        let file = file_with(b"image");
        let cached = Fingerprint::capture(file.path(), ComparisonMode::Hash).unwrap();
        assert_eq!(
            decide(file.path(), Some(&cached), ComparisonMode::Hash).unwrap(),
            Decision::Unchanged
        );
    }

    #[test]
    fn test_hash_mismatch_is_changed() {
        let file = file_with(b"image");
        let cached = Fingerprint {
            hash: Some("0".repeat(64)),
            mtime: None,
        };
        assert_eq!(
            decide(file.path(), Some(&cached), ComparisonMode::Hash).unwrap(),
            Decision::Changed
        );
    }

    #[test]
    fn test_timestamp_match_is_unchanged() {
        let file = file_with(b"image");
        let cached = Fingerprint::capture(file.path(), ComparisonMode::Timestamp).unwrap();
        assert_eq!(
            decide(file.path(), Some(&cached), ComparisonMode::Timestamp).unwrap(),
            Decision::Unchanged
        );
    }

    #[test]
    fn test_timestamp_mismatch_is_changed() {
        let file = file_with(b"image");
        let cached = Fingerprint {
            hash: None,
            mtime: Some(0),
        };
        assert_eq!(
            decide(file.path(), Some(&cached), ComparisonMode::Timestamp).unwrap(),
            Decision::Changed
        );
    }
}
