//! Safe replacement of an original file by its optimized artifact.
//!
//! The sequence is strict: download adjacent to the original, verify the
//! byte size, rename the original to a `.orig` backup, rename the
//! artifact into place, recompute the fingerprint. Every failure is a
//! named terminal outcome and the original is never lost or left under
//! the wrong name. The backup is deliberately never deleted here; it is
//! the recovery mechanism.

use crate::config::{ComparisonMode, NetworkConfig};
use crate::error::{RekrakeError, Result};
use crate::fingerprint::Fingerprint;
use async_trait::async_trait;
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Terminal state of one replace call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// Artifact swapped in. `fingerprint` is the recomputed state of the
    /// file now at the original path, `None` only when recomputation
    /// itself failed (nothing is persisted then and a later run simply
    /// re-checks the file).
    Succeeded { fingerprint: Option<Fingerprint> },
    /// Artifact could not be fetched; no filesystem change.
    DownloadFailed { message: String },
    /// Downloaded artifact had the wrong byte size; artifact deleted,
    /// original untouched.
    SizeMismatch { expected: u64, actual: u64 },
    /// Renaming the original to its backup name failed; original
    /// untouched, artifact left in place for inspection.
    BackupFailed { message: String },
    /// Swapping the artifact in failed, but the backup was renamed back.
    SwapFailedRestored { message: String },
    /// Swapping failed and the restore failed too: the original content
    /// only exists under the backup name. Requires intervention.
    SwapFailedUnrestored { message: String },
}

impl ReplaceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ReplaceOutcome::Succeeded { .. })
    }
}

/// Seam for the replace step, implemented by [`SafeReplacer`] in
/// production and by stubs in coordinator tests.
#[async_trait]
pub trait Replacer: Send + Sync {
    /// Run the full download-verify-backup-swap sequence for one file.
    async fn replace(
        &self,
        path: &Path,
        artifact_url: &str,
        expected_size: u64,
        mode: ComparisonMode,
    ) -> ReplaceOutcome;
}

/// Production replacer downloading artifacts over HTTP.
pub struct SafeReplacer {
    http: reqwest::Client,
}

impl SafeReplacer {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| RekrakeError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;
        Ok(Self { http })
    }

    /// Reuse an existing reqwest client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Stream the artifact to `temp_path`. Cleans up the partial file on
    /// failure; never touches the original.
    async fn download_artifact(&self, url: &str, temp_path: &Path) -> Result<u64> {
        let result = self.do_download(url, temp_path).await;
        if result.is_err() {
            let _ = std::fs::remove_file(temp_path);
        }
        result
    }

    async fn do_download(&self, url: &str, temp_path: &Path) -> Result<u64> {
        let response = self.http.get(url).send().await.map_err(|e| {
            RekrakeError::DownloadFailed {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RekrakeError::DownloadFailed {
                url: url.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let mut file = std::fs::File::create(temp_path)
            .map_err(|e| RekrakeError::io_with_path(e, temp_path))?;

        let mut bytes_downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RekrakeError::DownloadFailed {
                url: url.to_string(),
                message: format!("stream error: {}", e),
            })?;
            file.write_all(&chunk)
                .map_err(|e| RekrakeError::io_with_path(e, temp_path))?;
            bytes_downloaded += chunk.len() as u64;
        }

        file.flush()
            .map_err(|e| RekrakeError::io_with_path(e, temp_path))?;

        debug!("Downloaded {} bytes to {}", bytes_downloaded, temp_path.display());
        Ok(bytes_downloaded)
    }
}

#[async_trait]
impl Replacer for SafeReplacer {
    async fn replace(
        &self,
        path: &Path,
        artifact_url: &str,
        expected_size: u64,
        mode: ComparisonMode,
    ) -> ReplaceOutcome {
        let temp_path = path_with_suffix(path, NetworkConfig::OPTIMIZED_TEMP_SUFFIX);

        if let Err(e) = self.download_artifact(artifact_url, &temp_path).await {
            return ReplaceOutcome::DownloadFailed {
                message: e.to_string(),
            };
        }

        swap_optimized(path, &temp_path, expected_size, mode)
    }
}

/// Append a suffix to a path, keeping it in the same directory. Works on
/// the raw `OsStr` so non-UTF-8 file names keep their exact bytes.
pub fn path_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Backup path for a file (original name plus the fixed suffix).
pub fn backup_path(path: &Path) -> PathBuf {
    path_with_suffix(path, NetworkConfig::BACKUP_SUFFIX)
}

/// Filesystem half of the replace sequence: verify the artifact already
/// at `temp_path`, then back up and swap. Split from the download so the
/// rename choreography is testable without a network.
fn swap_optimized(
    path: &Path,
    temp_path: &Path,
    expected_size: u64,
    mode: ComparisonMode,
) -> ReplaceOutcome {
    swap_optimized_with(path, temp_path, expected_size, mode, |from, to| {
        std::fs::rename(from, to)
    })
}

/// Same sequence with the rename operation injected, so tests can fail
/// one specific rename without breaking the others.
fn swap_optimized_with(
    path: &Path,
    temp_path: &Path,
    expected_size: u64,
    mode: ComparisonMode,
    rename: impl Fn(&Path, &Path) -> std::io::Result<()>,
) -> ReplaceOutcome {
    // Step 2: exact byte-size verification
    let actual = match std::fs::metadata(temp_path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            let _ = std::fs::remove_file(temp_path);
            return ReplaceOutcome::DownloadFailed {
                message: format!("artifact missing after download: {}", e),
            };
        }
    };
    if actual != expected_size {
        warn!(
            "Artifact for {} has {} bytes, expected {}",
            path.display(),
            actual,
            expected_size
        );
        let _ = std::fs::remove_file(temp_path);
        return ReplaceOutcome::SizeMismatch {
            expected: expected_size,
            actual,
        };
    }

    // Step 3: rename the original to its backup name. Atomic-or-noop, so
    // a failure here leaves the original untouched.
    let backup = backup_path(path);
    if let Err(e) = rename(path, &backup) {
        return ReplaceOutcome::BackupFailed {
            message: format!("rename to {} failed: {}", backup.display(), e),
        };
    }

    // Step 4: rename the artifact into place, restoring on failure
    if let Err(swap_err) = rename(temp_path, path) {
        return match rename(&backup, path) {
            Ok(()) => ReplaceOutcome::SwapFailedRestored {
                message: swap_err.to_string(),
            },
            Err(restore_err) => {
                error!(
                    "Swap of {} failed ({}) and restore from {} failed too ({})",
                    path.display(),
                    swap_err,
                    backup.display(),
                    restore_err
                );
                ReplaceOutcome::SwapFailedUnrestored {
                    message: format!("swap: {}; restore: {}", swap_err, restore_err),
                }
            }
        };
    }

    // Step 5: recompute the fingerprint of the file now in place
    let fingerprint = match Fingerprint::capture(path, mode) {
        Ok(fp) => Some(fp),
        Err(e) => {
            warn!(
                "Replaced {} but could not recompute its fingerprint: {}",
                path.display(),
                e
            );
            None
        }
    };

    info!("Replaced {} (backup at {})", path.display(), backup.display());
    ReplaceOutcome::Succeeded { fingerprint }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_swap_success_keeps_backup() {
        let dir = TempDir::new().unwrap();
        let original = write_file(&dir, "cover.jpg", b"original image bytes");
        let temp = write_file(&dir, "cover.jpg.optimized-tmp", b"optimized");

        let outcome = swap_optimized(&original, &temp, 9, ComparisonMode::Hash);

        let ReplaceOutcome::Succeeded { fingerprint } = outcome else {
            panic!("expected success, got {:?}", outcome);
        };
        assert_eq!(std::fs::read(&original).unwrap(), b"optimized");
        assert_eq!(
            std::fs::read(backup_path(&original)).unwrap(),
            b"original image bytes"
        );
        assert!(!temp.exists());

        // Fingerprint matches the file now on disk
        let fresh = Fingerprint::capture(&original, ComparisonMode::Hash).unwrap();
        assert_eq!(fingerprint, Some(fresh));
    }

    #[test]
    fn test_size_mismatch_leaves_original_untouched() {
        let dir = TempDir::new().unwrap();
        let original = write_file(&dir, "cover.jpg", b"original image bytes");
        let temp = write_file(&dir, "cover.jpg.optimized-tmp", b"short");

        let outcome = swap_optimized(&original, &temp, 9_999, ComparisonMode::Hash);

        assert_eq!(
            outcome,
            ReplaceOutcome::SizeMismatch {
                expected: 9_999,
                actual: 5
            }
        );
        assert_eq!(std::fs::read(&original).unwrap(), b"original image bytes");
        assert!(!temp.exists());
        assert!(!backup_path(&original).exists());
    }

    #[test]
    fn test_backup_failure_leaves_artifact_for_inspection() {
        let dir = TempDir::new().unwrap();
        // Original never existed, so the backup rename must fail
        let original = dir.path().join("missing.jpg");
        let temp = write_file(&dir, "missing.jpg.optimized-tmp", b"optimized");

        let outcome = swap_optimized(&original, &temp, 9, ComparisonMode::Hash);

        assert!(matches!(outcome, ReplaceOutcome::BackupFailed { .. }));
        assert!(temp.exists());
        assert!(!original.exists());
    }

    #[test]
    fn test_swap_failure_restores_original() {
        let dir = TempDir::new().unwrap();
        let original = write_file(&dir, "cover.jpg", b"original image bytes");
        let temp = write_file(&dir, "cover.jpg.optimized-tmp", b"optimized");

        // Fail only the rename that moves the artifact into place; the
        // backup rename and the restore rename go through untouched.
        let outcome = swap_optimized_with(
            &original,
            &temp,
            9,
            ComparisonMode::Hash,
            |from, to| {
                if from == temp {
                    Err(std::io::Error::other("injected swap failure"))
                } else {
                    std::fs::rename(from, to)
                }
            },
        );

        assert!(matches!(outcome, ReplaceOutcome::SwapFailedRestored { .. }));
        assert_eq!(
            std::fs::read(&original).unwrap(),
            b"original image bytes"
        );
        assert!(!backup_path(&original).exists());
    }

    #[test]
    fn test_swap_and_restore_failure_keeps_content_under_backup_name() {
        let dir = TempDir::new().unwrap();
        let original = write_file(&dir, "cover.jpg", b"original image bytes");
        let temp = write_file(&dir, "cover.jpg.optimized-tmp", b"optimized");

        // Only the first rename (original to backup) succeeds
        let backup = backup_path(&original);
        let outcome = swap_optimized_with(
            &original,
            &temp,
            9,
            ComparisonMode::Hash,
            |_, to| {
                if to == backup {
                    std::fs::rename(&original, to)
                } else {
                    Err(std::io::Error::other("injected rename failure"))
                }
            },
        );

        assert!(matches!(
            outcome,
            ReplaceOutcome::SwapFailedUnrestored { .. }
        ));
        assert!(!original.exists());
        assert_eq!(std::fs::read(&backup).unwrap(), b"original image bytes");
    }

    #[test]
    fn test_timestamp_mode_captures_mtime() {
        let dir = TempDir::new().unwrap();
        let original = write_file(&dir, "cover.png", b"aaa");
        let temp = write_file(&dir, "cover.png.optimized-tmp", b"bb");

        let outcome = swap_optimized(&original, &temp, 2, ComparisonMode::Timestamp);

        let ReplaceOutcome::Succeeded {
            fingerprint: Some(fp),
        } = outcome
        else {
            panic!("expected success with fingerprint");
        };
        assert!(fp.mtime.is_some());
        assert!(fp.hash.is_none());
    }

    #[test]
    fn test_path_helpers_stay_adjacent() {
        let path = Path::new("/library/rec-1/cover.jpg");
        assert_eq!(
            path_with_suffix(path, ".optimized-tmp"),
            PathBuf::from("/library/rec-1/cover.jpg.optimized-tmp")
        );
        assert_eq!(
            backup_path(path),
            PathBuf::from("/library/rec-1/cover.jpg.orig")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_path_suffix_keeps_non_utf8_name_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let name = std::ffi::OsStr::from_bytes(b"cover-\xff\xfe.jpg");
        let path = Path::new(name);
        assert_eq!(
            path_with_suffix(path, ".orig").as_os_str().as_bytes(),
            b"cover-\xff\xfe.jpg.orig"
        );
    }

    #[tokio::test]
    async fn test_download_failure_is_terminal_and_clean() {
        let dir = TempDir::new().unwrap();
        let original = write_file(&dir, "cover.jpg", b"original");

        // Nothing listens on port 1; the connection is refused locally
        let replacer = SafeReplacer::new().unwrap();
        let outcome = replacer
            .replace(&original, "http://127.0.0.1:1/artifact", 8, ComparisonMode::Hash)
            .await;

        assert!(matches!(outcome, ReplaceOutcome::DownloadFailed { .. }));
        assert_eq!(std::fs::read(&original).unwrap(), b"original");
        assert!(!path_with_suffix(&original, NetworkConfig::OPTIMIZED_TEMP_SUFFIX).exists());
    }
}
