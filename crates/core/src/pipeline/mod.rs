//! The scan → cache → inject orchestrator.
//!
//! ```text
//! Init → Scanning → Caching → Injecting → Done
//!   └────────┴──────────┴──────────┴──────→ Failed
//! ```
//!
//! Every stage is a barrier: all scanning tasks are joined before the cache
//! is written, and the cache is written before any registry target is
//! rewritten.

mod fold;
mod report;

pub use fold::Discovery;
pub use report::{
    ArchiveSummary, InjectionStatus, InjectionSummary, PipelineReport, TreeSummary,
};

use autoreg_plugin::UnitCodec;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::CacheStore;
use crate::error::{AutoregError, Result};
use crate::hierarchy::{HierarchyResolver, TransitiveResolver};
use crate::inject::{CodeInjector, InjectionOutcome};
use crate::model::{ArchiveHarvest, RegisterConfig, ScanPartial, TrackedSpec};
use crate::scan::{
    ArchiveScan, ArchiveScanner, TreeScan, TreeScanner, UnitClassifier, destination_name,
};

/// Inputs and locations of one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub archives: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub cache_file: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Scanning,
    Caching,
    Injecting,
    Done,
    Failed,
}

impl PipelineState {
    fn can_enter(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Init, Scanning)
                | (Scanning, Caching)
                | (Caching, Injecting)
                | (Injecting, Done)
                | (Done | Failed, Init)
                | (Init | Scanning | Caching | Injecting, Failed)
        )
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| AutoregError::input(path, e))
}

fn dedup_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(paths.len());
    for path in paths {
        let path = absolute(path)?;
        if seen.insert(path.clone()) {
            unique.push(path);
        } else {
            warn!("Ignoring repeated input {}", path.display());
        }
    }
    Ok(unique)
}

pub struct Pipeline {
    codec: Arc<dyn UnitCodec>,
    registrations: RegisterConfig,
    tracked: Vec<TrackedSpec>,
    archives: Vec<PathBuf>,
    directories: Vec<PathBuf>,
    output_dir: PathBuf,
    cache: CacheStore,
    resolver: Box<dyn HierarchyResolver>,
    state: PipelineState,
    harvests: BTreeMap<String, ArchiveHarvest>,
    discoveries: Vec<Discovery>,
    report: PipelineReport,
}

impl Pipeline {
    pub fn new(
        codec: Arc<dyn UnitCodec>,
        registrations: RegisterConfig,
        config: PipelineConfig,
    ) -> Result<Self> {
        let tracked = registrations.tracked()?;
        let archives = dedup_paths(&config.archives)?;
        let directories = dedup_paths(&config.directories)?;

        let mut mirrors: HashMap<_, &PathBuf> = HashMap::new();
        for dir in &directories {
            let Some(base) = dir.file_name() else {
                return Err(AutoregError::Config(format!(
                    "input directory {} has no base name",
                    dir.display()
                )));
            };
            if let Some(other) = mirrors.insert(base.to_os_string(), dir) {
                return Err(AutoregError::Config(format!(
                    "input directories {} and {} share an output name",
                    other.display(),
                    dir.display()
                )));
            }
        }

        Ok(Self {
            codec,
            registrations,
            tracked,
            archives,
            directories,
            output_dir: absolute(&config.output_dir)?,
            cache: CacheStore::new(absolute(&config.cache_file)?),
            resolver: Box::new(TransitiveResolver),
            state: PipelineState::Init,
            harvests: BTreeMap::new(),
            discoveries: Vec::new(),
            report: PipelineReport::default(),
        })
    }

    /// Replace the resolver used when `resolve_hierarchy` is enabled.
    pub fn with_resolver(mut self, resolver: Box<dyn HierarchyResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn discoveries(&self) -> &[Discovery] {
        &self.discoveries
    }

    pub fn report(&self) -> &PipelineReport {
        &self.report
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn enter(&mut self, next: PipelineState) -> Result<()> {
        if !self.state.can_enter(next) {
            return Err(AutoregError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!("Pipeline {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            error!("Pipeline failed in {:?}: {}", self.state, e);
            self.state = PipelineState::Failed;
        }
        result
    }

    /// Return a finished or failed pipeline to `Init`, dropping all results.
    pub fn reset(&mut self) -> Result<()> {
        self.enter(PipelineState::Init)?;
        self.harvests.clear();
        self.discoveries.clear();
        self.report = PipelineReport::default();
        Ok(())
    }

    /// Run every stage and return the report.
    pub fn run(&mut self) -> Result<PipelineReport> {
        let start = Instant::now();
        self.scan()?;
        self.persist_cache()?;
        self.inject()?;
        self.report.elapsed = start.elapsed();
        info!(
            "Pipeline done in {:?}: {} archives ({} cached, {} copied), {} trees, {} calls injected",
            self.report.elapsed,
            self.report.archives.len(),
            self.report.cache_hits(),
            self.report.copied_archives(),
            self.report.trees.len(),
            self.report.injected_calls()
        );
        Ok(self.report.clone())
    }

    /// `Init` work then `Scanning`: prepare the output area, scan every
    /// input in parallel and fold the results into discoveries.
    pub fn scan(&mut self) -> Result<()> {
        if self.state != PipelineState::Init {
            return Err(AutoregError::InvalidTransition {
                from: self.state,
                to: PipelineState::Scanning,
            });
        }
        self.discoveries.clear();
        self.harvests.clear();
        let result = self.prepare_and_scan();
        self.settle(result)
    }

    fn prepare_and_scan(&mut self) -> Result<()> {
        let cached = self.load_cache();
        self.prune_output()?;
        self.enter(PipelineState::Scanning)?;

        let collect_types = self.registrations.resolve_hierarchy;
        let classifier = UnitClassifier::new(self.codec.clone(), &self.tracked);
        let archive_scanner =
            ArchiveScanner::new(&classifier, &self.output_dir).collect_types(collect_types);
        let tree_scanner =
            TreeScanner::new(&classifier, &self.output_dir).collect_types(collect_types);

        let (archive_results, tree_results): (Vec<Result<ArchiveScan>>, Vec<Result<TreeScan>>) =
            rayon::join(
                || {
                    self.archives
                        .par_iter()
                        .map(|archive| {
                            let key = archive.to_string_lossy();
                            archive_scanner.scan(archive, cached.get(key.as_ref()))
                        })
                        .collect()
                },
                || {
                    self.directories
                        .par_iter()
                        .map(|dir| tree_scanner.scan(dir))
                        .collect()
                },
            );
        let archive_scans = archive_results.into_iter().collect::<Result<Vec<_>>>()?;
        let tree_scans = tree_results.into_iter().collect::<Result<Vec<_>>>()?;

        let mut partials: Vec<ScanPartial> = Vec::new();
        for scan in &archive_scans {
            partials.push(scan.harvest.to_partial(&scan.archive, &scan.destination));
            self.report.archives.push(ArchiveSummary::from(scan));
        }
        for scan in tree_scans {
            self.report.trees.push(TreeSummary::from(&scan));
            partials.push(scan.partial);
        }

        let resolver = collect_types.then_some(self.resolver.as_ref());
        self.discoveries = fold::fold(&self.tracked, partials, resolver);
        self.harvests = archive_scans
            .into_iter()
            .map(|scan| (scan.archive.to_string_lossy().into_owned(), scan.harvest))
            .collect();
        Ok(())
    }

    /// Cached harvests of the current inputs; entries for other archives are
    /// dropped.
    fn load_cache(&self) -> BTreeMap<String, ArchiveHarvest> {
        let mut cached = self.cache.load(self.registrations.fingerprint());
        let inputs: HashSet<String> = self
            .archives
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let before = cached.len();
        cached.retain(|path, _| inputs.contains(path));
        if cached.len() < before {
            debug!("Evicted {} stale cache entries", before - cached.len());
        }
        cached
    }

    /// Remove everything in the output area that this run will not
    /// produce. Copies of current archives stay so an unchanged archive can
    /// skip its copy.
    fn prune_output(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        let keep: HashSet<PathBuf> = self
            .archives
            .iter()
            .map(|a| self.output_dir.join(destination_name(a)))
            .collect();

        for entry in fs::read_dir(&self.output_dir)? {
            let path = entry?.path();
            if path == self.cache.path() || keep.contains(&path) {
                continue;
            }
            debug!("Removing stale output {}", path.display());
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// `Caching`: replace the cache file with this run's harvests. A write
    /// failure is logged and the stale file removed; the run continues.
    pub fn persist_cache(&mut self) -> Result<()> {
        self.enter(PipelineState::Caching)?;
        match self
            .cache
            .save(self.registrations.fingerprint(), &self.harvests)
        {
            Ok(()) => {
                debug!(
                    "Wrote {} archive harvests to {}",
                    self.harvests.len(),
                    self.cache.path().display()
                );
                self.report.cache_saved = true;
            }
            Err(e) => {
                warn!("Failed to write cache {}: {}", self.cache.path().display(), e);
                if let Err(e) = self.cache.clear() {
                    warn!("Failed to remove stale cache: {}", e);
                }
            }
        }
        Ok(())
    }

    /// `Injecting` then `Done`: rewrite each registry target once per spec,
    /// in configuration order.
    pub fn inject(&mut self) -> Result<()> {
        self.enter(PipelineState::Injecting)?;
        let result = self.inject_all();
        let result = self.settle(result);
        if result.is_ok() {
            self.enter(PipelineState::Done)?;
        }
        result
    }

    fn inject_all(&mut self) -> Result<()> {
        let injector = CodeInjector::new(self.codec.clone());
        for (tracked, discovery) in self.tracked.iter().zip(&self.discoveries) {
            let status = match &discovery.target {
                None => {
                    error!(
                        "Registry target {} for {} not found in any input; skipping",
                        discovery.target_class, discovery.interface_name
                    );
                    InjectionStatus::MissingTarget
                }
                Some(target) => match injector.inject(tracked, target, &discovery.implementers)? {
                    InjectionOutcome::Injected { count } => InjectionStatus::Injected { count },
                    InjectionOutcome::NoImplementers => InjectionStatus::NoImplementers,
                },
            };
            self.report.injections.push(InjectionSummary {
                interface_name: discovery.interface_name.clone(),
                target_class: discovery.target_class.clone(),
                status,
            });
        }
        Ok(())
    }
}
