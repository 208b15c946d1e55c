//! Run coordination.
//!
//! Drives one sequential pass over all candidate files: detector decision,
//! optional upload, optional safe replace, metadata update, statistics.
//! Files are processed strictly one at a time; a replace sequence always
//! runs to a terminal outcome before the next file starts. The coordinator
//! is the only component that touches [`RunStatistics`].

use crate::client::{OptimizationResult, Optimizer};
use crate::config::RunOptions;
use crate::detector::{self, Decision};
use crate::error::Result;
use crate::metadata::MetadataStore;
use crate::replace::{ReplaceOutcome, Replacer};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// One file eligible for optimization this run. Host-provided, ephemeral.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// Identifier of the owning record.
    pub record_id: String,
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Byte size at enumeration time.
    pub size: u64,
}

impl CandidateFile {
    /// Build a candidate from a path, reading its current size.
    pub fn from_path(record_id: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let size = std::fs::metadata(&path)
            .map_err(|e| crate::error::RekrakeError::io_with_path(e, &path))?
            .len();
        Ok(Self {
            record_id: record_id.into(),
            path,
            size,
        })
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Counters for one run. Monotonically increasing; read once at run end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    /// Distinct records seen.
    pub records_checked: u64,
    /// Candidate files examined.
    pub files_checked: u64,
    /// Files with no prior fingerprint.
    pub unknown: u64,
    /// Files whose cached fingerprint was actually compared.
    pub compared: u64,
    /// Files found changed (or comparison bypassed in `none` mode).
    pub changed: u64,
    /// Files uploaded to the optimizer.
    pub uploaded: u64,
    /// Files successfully replaced by their optimized artifact.
    pub replaced: u64,
    /// Files the service could not shrink further.
    pub already_optimal: u64,
    /// Failed optimizations or replaces.
    pub failed: u64,
    /// Files a dry run would have sent to the optimizer.
    pub would_process: u64,
    /// Original bytes of all replaced files.
    pub original_bytes: u64,
    /// Bytes saved across all replaced files.
    pub saved_bytes: u64,
}

/// Drives the detector → optimizer → replace sequence for one run.
pub struct RunCoordinator<'a, O: Optimizer, R: Replacer> {
    optimizer: &'a O,
    replacer: &'a R,
    store: &'a mut MetadataStore,
    options: RunOptions,
    stats: RunStatistics,
}

impl<'a, O: Optimizer, R: Replacer> RunCoordinator<'a, O, R> {
    pub fn new(
        optimizer: &'a O,
        replacer: &'a R,
        store: &'a mut MetadataStore,
        options: RunOptions,
    ) -> Self {
        Self {
            optimizer,
            replacer,
            store,
            options,
            stats: RunStatistics::default(),
        }
    }

    /// Process all candidates in order and return the final statistics.
    pub async fn run(mut self, candidates: &[CandidateFile]) -> RunStatistics {
        info!(
            "Starting run over {} candidate(s) (mode {}, lossy {}, dry-run {})",
            candidates.len(),
            self.options.mode,
            self.options.lossy,
            self.options.dry_run
        );

        let mut seen_records: HashSet<&str> = HashSet::new();
        // Files that entered the optimize-or-replace path this run
        let mut processed: u64 = 0;

        for candidate in candidates {
            if seen_records.insert(candidate.record_id.as_str()) {
                self.stats.records_checked += 1;
            }
            self.stats.files_checked += 1;

            let cap_reached = self
                .options
                .max_files
                .is_some_and(|cap| processed >= cap);

            if self.process_file(candidate, cap_reached).await {
                processed += 1;
            }
        }

        info!(
            "Run finished: {} uploaded, {} replaced, {} already optimal, {} failed, {} bytes saved",
            self.stats.uploaded,
            self.stats.replaced,
            self.stats.already_optimal,
            self.stats.failed,
            self.stats.saved_bytes
        );
        self.stats
    }

    /// Handle one candidate. Returns true if the file entered the
    /// optimize-or-replace path (and therefore counts against the cap).
    async fn process_file(&mut self, candidate: &CandidateFile, cap_reached: bool) -> bool {
        let file_name = candidate.file_name();

        // A corrupt metadata blob degrades to "everything unknown" for
        // the record rather than aborting the run.
        let cached = match self.store.get(&candidate.record_id) {
            Ok(map) => map.get(&file_name).cloned(),
            Err(e) => {
                warn!(
                    "Could not load metadata for record {}: {}",
                    candidate.record_id, e
                );
                None
            }
        };

        let decision = match detector::decide(&candidate.path, cached.as_ref(), self.options.mode) {
            Ok(d) => d,
            Err(e) => {
                warn!("Could not fingerprint {}: {}", candidate.path.display(), e);
                self.stats.failed += 1;
                return false;
            }
        };

        match decision {
            Decision::Unchanged => {
                self.stats.compared += 1;
                debug!("Skipping unchanged {}", candidate.path.display());
                return false;
            }
            Decision::Unknown => {
                self.stats.unknown += 1;
            }
            Decision::Changed => {
                if !matches!(self.options.mode, crate::config::ComparisonMode::None) {
                    self.stats.compared += 1;
                }
                self.stats.changed += 1;
            }
        }

        // Dry run: detection only, before any network or filesystem
        // mutation on this path. The cap never applies since nothing is
        // processed.
        if self.options.dry_run {
            self.stats.would_process += 1;
            info!("Would optimize {}", candidate.path.display());
            return false;
        }

        if cap_reached {
            debug!(
                "File cap reached, leaving {} unprocessed",
                candidate.path.display()
            );
            return false;
        }

        self.stats.uploaded += 1;
        let result = self
            .optimizer
            .optimize(&candidate.path, self.options.lossy)
            .await;

        self.handle_result(candidate, &file_name, result).await;
        true
    }

    async fn handle_result(
        &mut self,
        candidate: &CandidateFile,
        file_name: &str,
        result: OptimizationResult,
    ) {
        if !result.success {
            let message = result.error_message.as_deref().unwrap_or("unknown error");
            if result.is_transport_failure() {
                warn!(
                    "Optimization of {} failed in transport: {}",
                    candidate.path.display(),
                    message
                );
            } else {
                warn!(
                    "Service refused optimization of {}: {}",
                    candidate.path.display(),
                    message
                );
            }
            self.stats.failed += 1;
            return;
        }

        if result.saved_bytes <= 0 {
            info!(
                "{} is already optimal ({} bytes)",
                candidate.path.display(),
                result.original_size
            );
            self.stats.already_optimal += 1;
            return;
        }

        let Some(artifact_url) = result.artifact_url.as_deref() else {
            warn!(
                "Service reported savings for {} but returned no artifact URL",
                candidate.path.display()
            );
            self.stats.failed += 1;
            return;
        };

        let outcome = self
            .replacer
            .replace(
                &candidate.path,
                artifact_url,
                result.optimized_size,
                self.options.mode,
            )
            .await;

        match outcome {
            ReplaceOutcome::Succeeded { fingerprint } => {
                self.stats.replaced += 1;
                self.stats.original_bytes += result.original_size;
                self.stats.saved_bytes += result.saved_bytes.max(0) as u64;

                if let Some(fp) = fingerprint {
                    if let Err(e) = self.store.put(&candidate.record_id, file_name, fp) {
                        // The file is replaced either way; a lost write
                        // only means a redundant re-check next run.
                        warn!(
                            "Could not persist fingerprint for {}: {}",
                            candidate.path.display(),
                            e
                        );
                    }
                }
            }
            ReplaceOutcome::SwapFailedUnrestored { ref message } => {
                error!(
                    "DATA AT RISK: {} exists only under its backup name: {}",
                    candidate.path.display(),
                    message
                );
                self.stats.failed += 1;
            }
            other => {
                warn!(
                    "Replace of {} failed: {:?}",
                    candidate.path.display(),
                    other
                );
                self.stats.failed += 1;
            }
        }
    }
}
