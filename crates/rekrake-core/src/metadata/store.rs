//! Per-record fingerprint store with a read-through cache.
//!
//! Each owning record maps file basenames to their last-known
//! [`Fingerprint`]. Records are loaded lazily once per run and cached in
//! memory; every `put` writes the record's whole map back to the backend
//! immediately, so a crash never loses a completed optimization.
//!
//! Concurrent runs against the same backend are last-writer-wins; no
//! locking is attempted.

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::metadata::atomic::{atomic_read_json, atomic_write_json};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// File basename → last-known fingerprint, scoped to one record.
pub type FingerprintMap = HashMap<String, Fingerprint>;

/// Storage backend for per-record fingerprint maps.
///
/// The host owns the actual persistence mechanism; the store only needs
/// blob-in, blob-out semantics keyed by record id.
pub trait MetadataBackend: Send {
    /// Load the persisted map for a record. `Ok(None)` when none exists.
    fn read(&self, record_id: &str) -> Result<Option<FingerprintMap>>;

    /// Durably persist the full map for a record.
    fn write(&self, record_id: &str, map: &FingerprintMap) -> Result<()>;
}

/// Backend storing one JSON file per record under a data directory.
pub struct JsonFileBackend {
    data_dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn record_path(&self, record_id: &str) -> PathBuf {
        // Sanitize the id for use as a filename
        let safe_id = record_id.replace(['/', '\\', ':'], "-");
        self.data_dir.join(format!("{}.json", safe_id))
    }
}

impl MetadataBackend for JsonFileBackend {
    fn read(&self, record_id: &str) -> Result<Option<FingerprintMap>> {
        atomic_read_json(&self.record_path(record_id))
    }

    fn write(&self, record_id: &str, map: &FingerprintMap) -> Result<()> {
        atomic_write_json(&self.record_path(record_id), map)
    }
}

/// Read-through cached fingerprint store for one run.
pub struct MetadataStore {
    backend: Box<dyn MetadataBackend>,
    cache: HashMap<String, FingerprintMap>,
}

impl MetadataStore {
    pub fn new(backend: Box<dyn MetadataBackend>) -> Self {
        Self {
            backend,
            cache: HashMap::new(),
        }
    }

    /// Get the fingerprint map for a record, loading it from the backend
    /// on first access this run. Absence is an empty map, not an error.
    pub fn get(&mut self, record_id: &str) -> Result<&FingerprintMap> {
        if !self.cache.contains_key(record_id) {
            let map = match self.backend.read(record_id)? {
                Some(map) => {
                    debug!("Loaded {} fingerprint(s) for record {}", map.len(), record_id);
                    map
                }
                None => FingerprintMap::new(),
            };
            self.cache.insert(record_id.to_string(), map);
        }
        Ok(self
            .cache
            .get(record_id)
            .expect("record loaded into cache above"))
    }

    /// Record a new fingerprint for a file and persist the record's map
    /// immediately. Callers must only invoke this after a replace has
    /// fully succeeded.
    pub fn put(&mut self, record_id: &str, file_name: &str, fingerprint: Fingerprint) -> Result<()> {
        // Populate the cache entry first so the write sees prior entries
        self.get(record_id)?;

        let map = self
            .cache
            .get_mut(record_id)
            .expect("record loaded into cache above");
        map.insert(file_name.to_string(), fingerprint);

        self.backend.write(record_id, map)
    }
}
