use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use xxhash_rust::xxh3::xxh3_64;

use crate::model::ArchiveHarvest;

/// Cheap identity of an archive on disk
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ArchiveKey {
    pub path: PathBuf,
    pub size: u64,
    pub mtime: u64,
}

impl ArchiveKey {
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let mtime = metadata
            .modified()?
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            mtime,
        })
    }
}

pub fn content_fingerprint(bytes: &[u8]) -> u64 {
    xxh3_64(bytes)
}

impl ArchiveHarvest {
    /// Whether this cached harvest still describes the archive behind `key`.
    ///
    /// A size change is a miss without reading the file. Otherwise the
    /// content hash decides; mtime alone never proves a hit since restored
    /// or copied archives keep it.
    pub fn is_fresh<F>(&self, key: &ArchiveKey, fingerprint: F) -> std::io::Result<bool>
    where
        F: FnOnce() -> std::io::Result<u64>,
    {
        if self.size != key.size {
            return Ok(false);
        }
        Ok(fingerprint()? == self.fingerprint)
    }
}
