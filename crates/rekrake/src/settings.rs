//! Run configuration resolution.
//!
//! Precedence: command-line flag overrides config file overrides default.
//! The core only ever sees the fully resolved values.

use anyhow::{bail, Context, Result};
use rekrake_core::{ComparisonMode, RunOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Optional JSON config file (`~/.config/rekrake/config.json` by default).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub mode: Option<String>,
    pub lossy: Option<bool>,
    pub data_dir: Option<PathBuf>,
    pub max_files: Option<u64>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rekrake")
            .join("config.json")
    }
}

/// Fully resolved settings for one invocation.
#[derive(Debug)]
pub struct Settings {
    pub api_key: String,
    pub api_secret: String,
    pub data_dir: PathBuf,
    pub options: RunOptions,
}

/// Flag-shaped inputs from the CLI, all optional so the config file can
/// fill the gaps.
#[derive(Debug, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub mode: Option<String>,
    pub lossy: bool,
    pub dry_run: bool,
    pub data_dir: Option<PathBuf>,
    pub max_files: Option<u64>,
}

impl Settings {
    pub fn resolve(overrides: Overrides, file: ConfigFile) -> Result<Self> {
        let mode_str = overrides
            .mode
            .or(file.mode)
            .unwrap_or_else(|| ComparisonMode::Hash.as_str().to_string());
        let Some(mode) = ComparisonMode::from_str(&mode_str) else {
            bail!("Unknown comparison mode '{}' (expected none, hash or timestamp)", mode_str);
        };

        let dry_run = overrides.dry_run;

        let api_key = overrides.api_key.or(file.api_key).unwrap_or_default();
        let api_secret = overrides.api_secret.or(file.api_secret).unwrap_or_default();
        if !dry_run && (api_key.is_empty() || api_secret.is_empty()) {
            bail!("API credentials required (flags --api-key/--api-secret or config file)");
        }

        let data_dir = overrides
            .data_dir
            .or(file.data_dir)
            .unwrap_or_else(|| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("rekrake")
            });

        Ok(Self {
            api_key,
            api_secret,
            data_dir,
            options: RunOptions {
                mode,
                lossy: overrides.lossy || file.lossy.unwrap_or(false),
                dry_run,
                max_files: overrides.max_files.or(file.max_files),
            },
        })
    }
}
