//! Persistent archive-harvest cache.
//!
//! Maps an archive's absolute path to the [`ArchiveHarvest`] computed the
//! last time it was scanned, so unchanged archives skip member iteration.
//!
//! [`ArchiveHarvest`]: crate::model::ArchiveHarvest

pub mod fingerprint;
pub mod store;

pub use fingerprint::{ArchiveKey, content_fingerprint};
pub use store::{CACHE_VERSION, CacheFile, CacheStats, CacheStore, CachedArchiveSummary};
