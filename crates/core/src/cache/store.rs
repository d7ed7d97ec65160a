use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::ArchiveHarvest;

pub const CACHE_VERSION: u32 = 1;

/// On-disk layout of the cache file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheFile {
    pub version: u32,
    /// Fingerprint of the registration config the entries were computed for.
    pub config_hash: u64,
    /// Absolute archive path -> harvest.
    pub entries: BTreeMap<String, ArchiveHarvest>,
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub cache_file: PathBuf,
    pub total_archives: usize,
    pub total_implementers: usize,
    pub registry_archives: usize,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct CachedArchiveSummary {
    pub path: String,
    pub fingerprint: String,
    pub size_bytes: u64,
    pub implementers: usize,
    pub contains_registry_target: bool,
}

/// Loads and persists the archive-harvest map.
///
/// Loading never fails: an absent, unreadable, outdated or foreign cache
/// file is deleted and treated as empty. Saving replaces the file wholesale.
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<CacheFile> {
        let bytes = fs::read(&self.path).ok()?;
        match serde_json::from_slice::<CacheFile>(&bytes) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("Discarding unreadable cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn discard(&self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Failed to delete cache {}: {}", self.path.display(), e);
            }
        }
    }

    pub fn load(&self, config_hash: u64) -> BTreeMap<String, ArchiveHarvest> {
        match self.read() {
            Some(file) if file.version == CACHE_VERSION && file.config_hash == config_hash => {
                debug!(
                    "Loaded {} cached archive harvests from {}",
                    file.entries.len(),
                    self.path.display()
                );
                file.entries
            }
            Some(file) => {
                debug!(
                    "Cache {} is outdated (version {}, config {:016x})",
                    self.path.display(),
                    file.version,
                    file.config_hash
                );
                self.discard();
                BTreeMap::new()
            }
            None => {
                self.discard();
                BTreeMap::new()
            }
        }
    }

    /// Replace the cache file with `entries`.
    pub fn save(&self, config_hash: u64, entries: &BTreeMap<String, ArchiveHarvest>) -> Result<()> {
        let file = CacheFile {
            version: CACHE_VERSION,
            config_hash,
            entries: entries.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn summaries(&self) -> Vec<CachedArchiveSummary> {
        let Some(file) = self.read() else {
            return Vec::new();
        };
        file.entries
            .iter()
            .map(|(path, harvest)| CachedArchiveSummary {
                path: path.clone(),
                fingerprint: format!("{:016x}", harvest.fingerprint),
                size_bytes: harvest.size,
                implementers: harvest.implementer_count(),
                contains_registry_target: harvest.contains_registry_target,
            })
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        let summaries = self.summaries();
        CacheStats {
            cache_file: self.path.clone(),
            total_archives: summaries.len(),
            total_implementers: summaries.iter().map(|s| s.implementers).sum(),
            registry_archives: summaries
                .iter()
                .filter(|s| s.contains_registry_target)
                .count(),
            size_bytes: fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0),
        }
    }
}
