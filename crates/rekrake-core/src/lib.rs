//! rekrake-core - Change-detection and safe-replace pipeline for remote
//! image optimization.
//!
//! Given a host-provided list of candidate files, this crate decides per
//! file whether it needs to be sent to the remote optimization service,
//! uploads it, and — when the service yields a smaller artifact —
//! atomically swaps the file for the optimized version while retaining a
//! `.orig` backup. Fingerprints of replaced files are persisted so
//! repeated runs skip files that have not changed since.
//!
//! The crate is headless: candidate enumeration, configuration resolution
//! and report rendering belong to the embedding application.
//!
//! # Example
//!
//! ```rust,ignore
//! use rekrake_core::{
//!     CandidateFile, JsonFileBackend, KrakenClient, MetadataStore,
//!     RunCoordinator, RunOptions, SafeReplacer,
//! };
//!
//! #[tokio::main]
//! async fn main() -> rekrake_core::Result<()> {
//!     let client = KrakenClient::new("api-key", "api-secret")?;
//!     client.validate_credentials().await?;
//!
//!     let replacer = SafeReplacer::with_client(client.inner().clone());
//!     let mut store = MetadataStore::new(Box::new(JsonFileBackend::new("./rekrake-data")));
//!
//!     let candidates = vec![CandidateFile::from_path("record-1", "covers/front.jpg")?];
//!     let stats = RunCoordinator::new(&client, &replacer, &mut store, RunOptions::default())
//!         .run(&candidates)
//!         .await;
//!     println!("saved {} bytes", stats.saved_bytes);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod coordinator;
pub mod detector;
pub mod error;
pub mod fingerprint;
pub mod metadata;
pub mod replace;

// Re-export commonly used types
pub use client::{AccountStatus, KrakenClient, OptimizationResult, Optimizer};
pub use config::{ComparisonMode, NetworkConfig, RunOptions};
pub use coordinator::{CandidateFile, RunCoordinator, RunStatistics};
pub use detector::Decision;
pub use error::{RekrakeError, Result};
pub use fingerprint::Fingerprint;
pub use metadata::{FingerprintMap, JsonFileBackend, MetadataBackend, MetadataStore};
pub use replace::{ReplaceOutcome, Replacer, SafeReplacer};
