use autoreg_plugin::{UnitHeader, unit_entry_name};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where an implementer's bytes were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOrigin {
    Archive { archive: PathBuf, entry: String },
    Loose { path: PathBuf },
}

impl std::fmt::Display for UnitOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitOrigin::Archive { archive, entry } => write!(f, "{}!/{}", archive.display(), entry),
            UnitOrigin::Loose { path } => write!(f, "{}", path.display()),
        }
    }
}

/// A discovered implementer: internal name plus origin for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Implementer {
    pub name: String,
    pub origin: UnitOrigin,
}

/// Resolved location of a registry target in the output area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetLocation {
    Loose(PathBuf),
    Archived { archive: PathBuf, entry: String },
}

impl std::fmt::Display for TargetLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetLocation::Loose(path) => write!(f, "{}", path.display()),
            TargetLocation::Archived { archive, entry } => {
                write!(f, "{}!/{}", archive.display(), entry)
            }
        }
    }
}

/// Supertype edges of one unit, kept for hierarchy resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
    pub concrete: bool,
}

impl From<&UnitHeader> for TypeRecord {
    fn from(header: &UnitHeader) -> Self {
        Self {
            name: header.name.clone(),
            super_name: header.super_name.clone(),
            interfaces: header.interfaces.clone(),
            concrete: header.is_concrete(),
        }
    }
}

/// Scan result of one archive; the unit persisted in the cache file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveHarvest {
    /// xxh3-64 of the archive bytes.
    pub fingerprint: u64,
    pub size: u64,
    /// Modification time in nanoseconds since the epoch.
    pub mtime: u64,
    /// Contract name -> implementer names, in member order.
    pub implementers: BTreeMap<String, Vec<String>>,
    pub contains_registry_target: bool,
    /// Registry target name -> entry name inside the archive.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub registry_entries: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<TypeRecord>,
}

impl ArchiveHarvest {
    pub fn record_implementer(&mut self, contract: &str, name: &str) {
        self.implementers
            .entry(contract.to_string())
            .or_default()
            .push(name.to_string());
    }

    pub fn record_registry_target(&mut self, name: &str, entry: &str) {
        self.contains_registry_target = true;
        self.registry_entries
            .insert(name.to_string(), entry.to_string());
    }

    pub fn implementer_count(&self) -> usize {
        self.implementers.values().map(Vec::len).sum()
    }

    /// Expand into a partial result. `source` is the input archive,
    /// `destination` its copy in the output area.
    pub fn to_partial(&self, source: &Path, destination: &Path) -> ScanPartial {
        let origin = |name: &str| UnitOrigin::Archive {
            archive: source.to_path_buf(),
            entry: unit_entry_name(name),
        };

        let mut partial = ScanPartial::new(SourceKind::Archive, source.to_path_buf());
        for (contract, names) in &self.implementers {
            for name in names {
                partial.found.push((
                    contract.clone(),
                    Implementer {
                        name: name.clone(),
                        origin: origin(name),
                    },
                ));
            }
        }
        for (name, entry) in &self.registry_entries {
            partial.targets.push((
                name.clone(),
                TargetLocation::Archived {
                    archive: destination.to_path_buf(),
                    entry: entry.clone(),
                },
            ));
        }
        partial.types = self
            .types
            .iter()
            .map(|record| (record.clone(), origin(&record.name)))
            .collect();
        partial
    }
}

/// Loose trees are ordered before archives when partial results are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceKind {
    Tree,
    Archive,
}

/// What one archive or tree contributed, returned by a scanning task and
/// merged by the pipeline.
#[derive(Debug, Clone)]
pub struct ScanPartial {
    pub kind: SourceKind,
    pub source: PathBuf,
    /// (contract, implementer) in visit order.
    pub found: Vec<(String, Implementer)>,
    /// (registry target name, location) in visit order.
    pub targets: Vec<(String, TargetLocation)>,
    pub types: Vec<(TypeRecord, UnitOrigin)>,
}

impl ScanPartial {
    pub fn new(kind: SourceKind, source: PathBuf) -> Self {
        Self {
            kind,
            source,
            found: Vec::new(),
            targets: Vec::new(),
            types: Vec::new(),
        }
    }
}
