use autoreg_plugin::{UnitCodec, UnitHeader, internal_name};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use crate::model::TrackedSpec;

const UNIT_SUFFIX: &str = ".class";

/// Outcome of classifying one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Unit name; derived from the entry path when the header is unreadable.
    pub name: String,
    /// Tracked contracts the unit directly declares. Empty for abstract
    /// units and interfaces.
    pub implemented: Vec<String>,
    pub is_registry_target: bool,
    /// Present when the header was readable.
    pub header: Option<UnitHeader>,
}

/// Decides, per unit, which tracked contracts it implements and whether it
/// is a registry target. Pure: only reads the bytes it is given.
pub struct UnitClassifier {
    codec: Arc<dyn UnitCodec>,
    contracts: HashSet<String>,
    targets: HashSet<String>,
}

impl UnitClassifier {
    pub fn new(codec: Arc<dyn UnitCodec>, specs: &[TrackedSpec]) -> Self {
        let contracts = specs
            .iter()
            .flat_map(|tracked| tracked.spec.contracts().map(str::to_string))
            .collect();
        let targets = specs
            .iter()
            .map(|tracked| tracked.spec.target_class().to_string())
            .collect();
        Self {
            codec,
            contracts,
            targets,
        }
    }

    /// Whether a normalized entry path names an object unit.
    pub fn accepts(&self, entry_name: &str) -> bool {
        self.codec.accepts_entry(entry_name)
    }

    pub fn is_target_name(&self, name: &str) -> bool {
        self.targets.contains(name)
    }

    pub fn classify(&self, entry_name: &str, bytes: &[u8]) -> Classification {
        let entry_unit = internal_name(entry_name.trim_end_matches(UNIT_SUFFIX));
        let header = match self.codec.read_header(bytes) {
            Ok(header) => header,
            Err(e) => {
                warn!("Skipping malformed unit {}: {}", entry_name, e);
                return Classification {
                    is_registry_target: self.is_target_name(&entry_unit),
                    name: entry_unit,
                    ..Default::default()
                };
            }
        };

        let implemented = if header.is_concrete() {
            let mut declared: Vec<String> = self
                .contracts
                .iter()
                .filter(|contract| header.declares(contract))
                .cloned()
                .collect();
            declared.sort();
            declared
        } else {
            Vec::new()
        };

        Classification {
            is_registry_target: self.is_target_name(&header.name),
            name: header.name.clone(),
            implemented,
            header: Some(header),
        }
    }
}
