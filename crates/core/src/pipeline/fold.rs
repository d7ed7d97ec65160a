//! Deterministic merge of per-input scan results into per-contract
//! discoveries.

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{info, warn};

use crate::hierarchy::{HierarchyResolver, TypeGraph};
use crate::model::{Implementer, ScanPartial, TargetLocation, TrackedSpec, UnitOrigin};

/// What the scan found for one tracked contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub interface_name: String,
    pub target_class: String,
    /// Registration order.
    pub implementers: Vec<Implementer>,
    /// `None` when no scanned input contained the registry target.
    pub target: Option<TargetLocation>,
}

impl Discovery {
    pub fn implementer_names(&self) -> Vec<&str> {
        self.implementers.iter().map(|i| i.name.as_str()).collect()
    }
}

/// Merge partials into one [`Discovery`] per spec, in spec order.
///
/// Partials are ordered trees first, then archives, each by source path;
/// within a partial, visit order is kept. The result is therefore the same
/// whatever order the partials finished in.
pub(crate) fn fold(
    tracked: &[TrackedSpec],
    mut partials: Vec<ScanPartial>,
    resolver: Option<&dyn HierarchyResolver>,
) -> Vec<Discovery> {
    partials.sort_by(|a, b| (a.kind, &a.source).cmp(&(b.kind, &b.source)));

    let graph = resolver.map(|_| {
        TypeGraph::build(partials.iter().flat_map(|p| p.types.iter().map(|(record, _)| record)))
    });
    let mut type_origins: HashMap<&str, &UnitOrigin> = HashMap::new();
    for (record, origin) in partials.iter().flat_map(|p| p.types.iter()) {
        type_origins.entry(record.name.as_str()).or_insert(origin);
    }

    tracked
        .iter()
        .map(|tracked| {
            let spec = &tracked.spec;
            let contracts: HashSet<&str> = spec.contracts().collect();
            let mut seen: HashMap<String, UnitOrigin> = HashMap::new();
            let mut implementers = Vec::new();

            let direct = partials
                .iter()
                .flat_map(|p| p.found.iter())
                .filter(|(contract, _)| contracts.contains(contract.as_str()))
                .map(|(_, implementer)| implementer);
            for implementer in direct {
                if !tracked.accepts(&implementer.name) {
                    continue;
                }
                match seen.get(&implementer.name) {
                    Some(first) if *first != implementer.origin => warn!(
                        "Duplicate implementer {} at {}; keeping {}",
                        implementer.name, implementer.origin, first
                    ),
                    Some(_) => {}
                    None => {
                        seen.insert(implementer.name.clone(), implementer.origin.clone());
                        implementers.push(implementer.clone());
                    }
                }
            }

            if let (Some(resolver), Some(graph)) = (resolver, graph.as_ref()) {
                let mut extra = BTreeSet::new();
                for contract in &contracts {
                    extra.extend(resolver.resolve(graph, contract));
                }
                for name in extra {
                    if seen.contains_key(&name) || !tracked.accepts(&name) {
                        continue;
                    }
                    let Some(origin) = type_origins.get(name.as_str()) else {
                        continue;
                    };
                    seen.insert(name.clone(), (*origin).clone());
                    implementers.push(Implementer {
                        name,
                        origin: (*origin).clone(),
                    });
                }
            }

            let mut targets = partials
                .iter()
                .flat_map(|p| p.targets.iter())
                .filter(|(name, _)| name == spec.target_class())
                .map(|(_, location)| location);
            let target = targets.next().cloned();
            if let Some(ignored) = targets.find(|location| Some(*location) != target.as_ref()) {
                warn!(
                    "Registry target {} found more than once; ignoring {}",
                    spec.target_class(),
                    ignored
                );
            }

            info!(
                "{} implementers of {}: [{}]",
                implementers.len(),
                spec.interface_name,
                implementers
                    .iter()
                    .map(|i| i.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );

            Discovery {
                interface_name: spec.interface_name.clone(),
                target_class: spec.target_class().to_string(),
                implementers,
                target,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::TransitiveResolver;
    use crate::model::{InterfaceSpec, SourceKind, TypeRecord};
    use std::path::PathBuf;

    fn tracked() -> Vec<TrackedSpec> {
        let spec = InterfaceSpec::new("a.Plugin", "a.Registry", "register");
        vec![TrackedSpec::new(&spec).unwrap()]
    }

    fn archive_partial(path: &str, names: &[&str]) -> ScanPartial {
        let mut partial = ScanPartial::new(SourceKind::Archive, PathBuf::from(path));
        for name in names {
            partial.found.push((
                "a/Plugin".to_string(),
                Implementer {
                    name: name.to_string(),
                    origin: UnitOrigin::Archive {
                        archive: PathBuf::from(path),
                        entry: format!("{name}.class"),
                    },
                },
            ));
        }
        partial
    }

    #[test]
    fn test_order_is_independent_of_completion_order() {
        let x = archive_partial("/libs/x.jar", &["a/A"]);
        let y = archive_partial("/libs/y.jar", &["a/B"]);
        let mut tree = ScanPartial::new(SourceKind::Tree, PathBuf::from("/z/classes"));
        tree.found = archive_partial("/z/classes", &["a/T"]).found;

        let forward = fold(&tracked(), vec![x.clone(), y.clone(), tree.clone()], None);
        let reverse = fold(&tracked(), vec![tree, y, x], None);

        assert_eq!(forward[0].implementer_names(), vec!["a/T", "a/A", "a/B"]);
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_duplicates_keep_first() {
        let x = archive_partial("/libs/x.jar", &["a/A", "a/B"]);
        let y = archive_partial("/libs/y.jar", &["a/A"]);
        let discoveries = fold(&tracked(), vec![y, x], None);
        assert_eq!(discoveries[0].implementer_names(), vec!["a/A", "a/B"]);
        assert!(discoveries[0].target.is_none());
    }

    #[test]
    fn test_hierarchy_extras_follow_direct_implementers() {
        let mut x = archive_partial("/libs/x.jar", &["a/Direct"]);
        let origin = |name: &str| UnitOrigin::Archive {
            archive: PathBuf::from("/libs/x.jar"),
            entry: format!("{name}.class"),
        };
        let record = |name: &str, super_name: &str, interfaces: &[&str], concrete| TypeRecord {
            name: name.to_string(),
            super_name: Some(super_name.to_string()),
            interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
            concrete,
        };
        x.types = vec![
            (record("a/Direct", "java/lang/Object", &["a/Plugin"], true), origin("a/Direct")),
            (record("a/Base", "java/lang/Object", &["a/Plugin"], false), origin("a/Base")),
            (record("a/Zeta", "a/Base", &[], true), origin("a/Zeta")),
            (record("a/Alpha", "a/Base", &[], true), origin("a/Alpha")),
        ];

        let resolver = TransitiveResolver;
        let discoveries = fold(&tracked(), vec![x], Some(&resolver));
        assert_eq!(
            discoveries[0].implementer_names(),
            vec!["a/Direct", "a/Alpha", "a/Zeta"]
        );
    }
}
