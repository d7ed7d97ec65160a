use autoreg_plugin::normalize_entry_path;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{AutoregError, Result};
use crate::model::{Implementer, ScanPartial, SourceKind, TargetLocation, TypeRecord, UnitOrigin};
use crate::scan::UnitClassifier;

/// Result of scanning one loose directory tree.
#[derive(Debug, Clone)]
pub struct TreeScan {
    pub root: PathBuf,
    pub destination: PathBuf,
    pub partial: ScanPartial,
    pub classified: usize,
    pub elapsed: Duration,
}

/// Scans a directory of loose units. Never cached: the tree is rescanned and
/// copied to `<output>/<base name>` on every run.
pub struct TreeScanner<'a> {
    classifier: &'a UnitClassifier,
    output_dir: &'a Path,
    collect_types: bool,
}

impl<'a> TreeScanner<'a> {
    pub fn new(classifier: &'a UnitClassifier, output_dir: &'a Path) -> Self {
        Self {
            classifier,
            output_dir,
            collect_types: false,
        }
    }

    pub fn collect_types(mut self, enabled: bool) -> Self {
        self.collect_types = enabled;
        self
    }

    pub fn destination(&self, root: &Path) -> PathBuf {
        let base = root
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "classes".into());
        self.output_dir.join(base)
    }

    fn files(root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_file() => Some(entry.into_path()),
                Ok(_) => None,
                Err(e) => {
                    warn!("Skipping unreadable path under {}: {}", root.display(), e);
                    None
                }
            })
            .collect()
    }

    pub fn scan(&self, root: &Path) -> Result<TreeScan> {
        let start = Instant::now();
        let destination = self.destination(root);
        let mut partial = ScanPartial::new(SourceKind::Tree, root.to_path_buf());
        let mut classified = 0;

        let files = Self::files(root);
        for path in &files {
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let entry_name = normalize_entry_path(&relative.to_string_lossy());
            if !self.classifier.accepts(&entry_name) {
                continue;
            }

            let bytes = fs::read(path).map_err(|e| AutoregError::input(path, e))?;
            let classification = self.classifier.classify(&entry_name, &bytes);
            classified += 1;

            let origin = UnitOrigin::Loose { path: path.clone() };
            for contract in &classification.implemented {
                debug!("{} implements {}", classification.name, contract);
                partial.found.push((
                    contract.clone(),
                    Implementer {
                        name: classification.name.clone(),
                        origin: origin.clone(),
                    },
                ));
            }
            if classification.is_registry_target {
                partial.targets.push((
                    classification.name.clone(),
                    TargetLocation::Loose(destination.join(relative)),
                ));
            }
            if self.collect_types {
                if let Some(header) = &classification.header {
                    partial.types.push((TypeRecord::from(header), origin));
                }
            }
        }
        let scan_time = start.elapsed();

        Self::mirror(root, &destination, &files)?;

        let elapsed = start.elapsed();
        info!(
            "Scanned {} in {:?} (scan {:?}, {} units classified)",
            root.display(),
            elapsed,
            scan_time,
            classified
        );

        Ok(TreeScan {
            root: root.to_path_buf(),
            destination,
            partial,
            classified,
            elapsed,
        })
    }

    /// Replace `destination` with a copy of the tree.
    fn mirror(root: &Path, destination: &Path, files: &[PathBuf]) -> Result<()> {
        if destination.exists() {
            fs::remove_dir_all(destination)?;
        }
        fs::create_dir_all(destination)?;
        for path in files {
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let target = destination.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &target).map_err(|e| AutoregError::input(path, e))?;
        }
        Ok(())
    }
}
