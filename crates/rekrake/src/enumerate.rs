//! Candidate enumeration.
//!
//! Walks the given roots and turns image files into [`CandidateFile`]s.
//! The record id of a file is the name of the top-level directory it
//! belongs to under its root (files directly under a root use the root's
//! own name). Backups and leftover temp artifacts from earlier runs are
//! never candidates.

use anyhow::{Context, Result};
use rekrake_core::{CandidateFile, NetworkConfig};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Extensions the optimization service accepts.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "svg"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_pipeline_artifact(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.ends_with(NetworkConfig::BACKUP_SUFFIX)
        || name.ends_with(NetworkConfig::OPTIMIZED_TEMP_SUFFIX)
}

fn record_id_for(root: &Path, path: &Path) -> String {
    let fallback = || {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string())
    };
    match path.strip_prefix(root) {
        Ok(rel) => {
            let mut components = rel.components();
            let first = components.next();
            // A file directly under the root has no directory component
            if components.next().is_none() {
                fallback()
            } else {
                first
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .unwrap_or_else(fallback)
            }
        }
        Err(_) => fallback(),
    }
}

/// Enumerate all candidate files under the given roots, in a stable
/// depth-first order.
pub fn collect_candidates(roots: &[impl AsRef<Path>]) -> Result<Vec<CandidateFile>> {
    let mut candidates = Vec::new();

    for root in roots {
        let root = root.as_ref();
        if root.is_file() {
            if is_image(root) && !is_pipeline_artifact(root) {
                // A directly named file belongs to its parent directory
                let record_id = root
                    .parent()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| root.display().to_string());
                candidates.push(
                    CandidateFile::from_path(record_id, root)
                        .with_context(|| format!("Failed to stat {}", root.display()))?,
                );
            }
            continue;
        }

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
            let path = entry.path();
            if !entry.file_type().is_file() || !is_image(path) || is_pipeline_artifact(path) {
                continue;
            }
            candidates.push(
                CandidateFile::from_path(record_id_for(root, path), path)
                    .with_context(|| format!("Failed to stat {}", path.display()))?,
            );
        }
    }

    debug!("Enumerated {} candidate file(s)", candidates.len());
    Ok(candidates)
}
