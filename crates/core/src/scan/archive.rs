//! Archive scanning with cache reuse and copy-or-skip decisions.

use autoreg_plugin::normalize_entry_path;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;
use zip::ZipArchive;

use crate::cache::{ArchiveKey, content_fingerprint};
use crate::error::{AutoregError, Result};
use crate::model::{ArchiveHarvest, TypeRecord};
use crate::scan::UnitClassifier;

/// Output file name for an archive: base name plus a hash of its absolute
/// path, so same-named archives from different locations never collide.
pub fn destination_name(archive: &Path) -> String {
    let stem = archive
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("archive");
    let hash = xxh3_64(archive.to_string_lossy().as_bytes());
    match archive.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{hash:016x}.{ext}"),
        None => format!("{stem}_{hash:016x}"),
    }
}

/// Result of scanning one archive.
#[derive(Debug, Clone)]
pub struct ArchiveScan {
    pub archive: PathBuf,
    pub destination: PathBuf,
    pub harvest: ArchiveHarvest,
    /// Member iteration was skipped in favour of the cached harvest.
    pub cache_hit: bool,
    pub copied: bool,
    /// Units handed to the classifier during this scan.
    pub classified: usize,
    pub elapsed: Duration,
}

pub struct ArchiveScanner<'a> {
    classifier: &'a UnitClassifier,
    output_dir: &'a Path,
    collect_types: bool,
}

impl<'a> ArchiveScanner<'a> {
    pub fn new(classifier: &'a UnitClassifier, output_dir: &'a Path) -> Self {
        Self {
            classifier,
            output_dir,
            collect_types: false,
        }
    }

    /// Record every unit's supertypes for hierarchy resolution.
    pub fn collect_types(mut self, enabled: bool) -> Self {
        self.collect_types = enabled;
        self
    }

    pub fn destination(&self, archive: &Path) -> PathBuf {
        self.output_dir.join(destination_name(archive))
    }

    /// Scan `archive` (an absolute path), reusing `cached` when the archive
    /// is unchanged and its previous copy still exists.
    pub fn scan(&self, archive: &Path, cached: Option<&ArchiveHarvest>) -> Result<ArchiveScan> {
        let start = Instant::now();
        let destination = self.destination(archive);
        let key = ArchiveKey::from_path(archive).map_err(|e| AutoregError::input(archive, e))?;

        let mut bytes: Option<Vec<u8>> = None;
        let reusable = match cached {
            Some(harvest) if destination.exists() => harvest
                .is_fresh(&key, || {
                    let content = fs::read(archive)?;
                    let fingerprint = content_fingerprint(&content);
                    bytes = Some(content);
                    Ok(fingerprint)
                })
                .map_err(|e| AutoregError::input(archive, e))?,
            _ => false,
        };

        let (harvest, classified) = match (reusable, cached) {
            (true, Some(harvest)) => {
                let mut harvest = harvest.clone();
                harvest.mtime = key.mtime;
                (harvest, 0)
            }
            _ => {
                let content = match bytes {
                    Some(content) => content,
                    None => fs::read(archive).map_err(|e| AutoregError::input(archive, e))?,
                };
                self.harvest(archive, &key, &content)
            }
        };
        let cache_hit = reusable;

        // A registry-target archive is always re-emitted so injection never
        // sees a copy rewritten by a previous run.
        let copied = !cache_hit || harvest.contains_registry_target;
        if copied {
            fs::copy(archive, &destination)?;
        }

        let elapsed = start.elapsed();
        info!(
            "Scanned {} in {:?} (cache {}, {} units classified, {})",
            archive.display(),
            elapsed,
            if cache_hit { "hit" } else { "miss" },
            classified,
            if copied { "copied" } else { "skipped copy" }
        );

        Ok(ArchiveScan {
            archive: archive.to_path_buf(),
            destination,
            harvest,
            cache_hit,
            copied,
            classified,
            elapsed,
        })
    }

    fn harvest(&self, archive: &Path, key: &ArchiveKey, content: &[u8]) -> (ArchiveHarvest, usize) {
        let mut harvest = ArchiveHarvest {
            fingerprint: content_fingerprint(content),
            size: key.size,
            mtime: key.mtime,
            ..Default::default()
        };

        let mut zip = match ZipArchive::new(Cursor::new(content)) {
            Ok(zip) => zip,
            Err(e) => {
                warn!("Not a readable archive, passing through {}: {}", archive.display(), e);
                return (harvest, 0);
            }
        };

        let mut classified = 0;
        for index in 0..zip.len() {
            let mut entry = match zip.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping entry #{} of {}: {}", index, archive.display(), e);
                    continue;
                }
            };
            if entry.is_dir() {
                continue;
            }
            let entry_name = normalize_entry_path(entry.name());
            if !self.classifier.accepts(&entry_name) {
                continue;
            }

            let mut unit = Vec::new();
            if let Err(e) = entry.read_to_end(&mut unit) {
                warn!("Skipping unreadable {} in {}: {}", entry_name, archive.display(), e);
                continue;
            }

            let classification = self.classifier.classify(&entry_name, &unit);
            classified += 1;
            for contract in &classification.implemented {
                debug!("{} implements {}", classification.name, contract);
                harvest.record_implementer(contract, &classification.name);
            }
            if classification.is_registry_target {
                harvest.record_registry_target(&classification.name, &entry_name);
            }
            if self.collect_types {
                if let Some(header) = &classification.header {
                    harvest.types.push(TypeRecord::from(header));
                }
            }
        }

        (harvest, classified)
    }
}
