use std::path::PathBuf;
use std::time::Duration;

use crate::scan::{ArchiveScan, TreeScan};

#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub archive: PathBuf,
    pub destination: PathBuf,
    pub cache_hit: bool,
    pub copied: bool,
    pub classified: usize,
    pub implementers: usize,
    pub contains_registry_target: bool,
    pub elapsed: Duration,
}

impl From<&ArchiveScan> for ArchiveSummary {
    fn from(scan: &ArchiveScan) -> Self {
        Self {
            archive: scan.archive.clone(),
            destination: scan.destination.clone(),
            cache_hit: scan.cache_hit,
            copied: scan.copied,
            classified: scan.classified,
            implementers: scan.harvest.implementer_count(),
            contains_registry_target: scan.harvest.contains_registry_target,
            elapsed: scan.elapsed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TreeSummary {
    pub root: PathBuf,
    pub destination: PathBuf,
    pub classified: usize,
    pub implementers: usize,
    pub elapsed: Duration,
}

impl From<&TreeScan> for TreeSummary {
    fn from(scan: &TreeScan) -> Self {
        Self {
            root: scan.root.clone(),
            destination: scan.destination.clone(),
            classified: scan.classified,
            implementers: scan.partial.found.len(),
            elapsed: scan.elapsed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionStatus {
    Injected { count: usize },
    NoImplementers,
    MissingTarget,
}

#[derive(Debug, Clone)]
pub struct InjectionSummary {
    pub interface_name: String,
    pub target_class: String,
    pub status: InjectionStatus,
}

/// Everything a finished (or failed) run did, for display by callers.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub archives: Vec<ArchiveSummary>,
    pub trees: Vec<TreeSummary>,
    pub injections: Vec<InjectionSummary>,
    pub cache_saved: bool,
    pub elapsed: Duration,
}

impl PipelineReport {
    pub fn cache_hits(&self) -> usize {
        self.archives.iter().filter(|a| a.cache_hit).count()
    }

    pub fn copied_archives(&self) -> usize {
        self.archives.iter().filter(|a| a.copied).count()
    }

    pub fn injected_calls(&self) -> usize {
        self.injections
            .iter()
            .map(|i| match i.status {
                InjectionStatus::Injected { count } => count,
                _ => 0,
            })
            .sum()
    }
}
