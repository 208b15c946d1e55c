//! Centralized configuration for rekrake.
//!
//! Constants for the remote service endpoints and the filesystem suffixes
//! used by the replace sequence, plus the resolved per-run options the
//! coordinator receives. Precedence between flags, config files and
//! defaults is the CLI's concern; the core only sees final values.

use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const USER_STATUS_URL: &'static str = "https://api.kraken.io/user_status";
    pub const UPLOAD_URL: &'static str = "https://api.kraken.io/v1/upload";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
    pub const USER_AGENT: &'static str = "rekrake/0.3";
    /// Suffix for the downloaded artifact adjacent to the original.
    pub const OPTIMIZED_TEMP_SUFFIX: &'static str = ".optimized-tmp";
    /// Suffix for the retained pre-replace backup.
    pub const BACKUP_SUFFIX: &'static str = ".orig";
}

/// How a known file is compared against its cached fingerprint.
///
/// A closed set: any other configuration value is rejected by the CLI
/// before a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComparisonMode {
    /// Bypass comparison entirely; every known file is re-sent.
    None,
    /// Compare streaming SHA-256 of the file contents.
    #[default]
    Hash,
    /// Compare modification time in whole seconds since epoch.
    Timestamp,
}

impl ComparisonMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonMode::None => "none",
            ComparisonMode::Hash => "hash",
            ComparisonMode::Timestamp => "timestamp",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(ComparisonMode::None),
            "hash" => Some(ComparisonMode::Hash),
            "timestamp" => Some(ComparisonMode::Timestamp),
            _ => None,
        }
    }
}

impl std::fmt::Display for ComparisonMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fully resolved options for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Comparison mode for known files.
    pub mode: ComparisonMode,
    /// Pass-through flag selecting the service's lossy strategy.
    pub lossy: bool,
    /// Detection only: no network calls, no filesystem mutation.
    pub dry_run: bool,
    /// Cap on files entering the optimize-or-replace path this run.
    /// Unchanged files do not count against it.
    pub max_files: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: ComparisonMode::Hash,
            lossy: false,
            dry_run: false,
            max_files: None,
        }
    }
}
