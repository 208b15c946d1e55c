//! Fingerprint persistence.

pub mod atomic;
pub mod store;

pub use store::{FingerprintMap, JsonFileBackend, MetadataBackend, MetadataStore};
