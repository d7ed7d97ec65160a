//! Supertype graph for registering implementers reached through
//! intermediate types.

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::model::TypeRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    InheritsFrom,
    Implements,
}

#[derive(Debug, Clone)]
pub struct TypeNode {
    pub name: String,
    /// Unknown types (referenced but never scanned) are not concrete.
    pub concrete: bool,
}

/// Edges point from subtype to supertype.
#[derive(Default)]
pub struct TypeGraph {
    topology: StableDiGraph<TypeNode, EdgeKind>,
    index: HashMap<String, NodeIndex>,
}

impl TypeGraph {
    pub fn build<'a>(records: impl IntoIterator<Item = &'a TypeRecord>) -> Self {
        let mut graph = Self::default();
        for record in records {
            let node = graph.node(&record.name);
            graph.topology[node].concrete |= record.concrete;
            if let Some(super_name) = &record.super_name {
                let parent = graph.node(super_name);
                graph.topology.add_edge(node, parent, EdgeKind::InheritsFrom);
            }
            for interface in &record.interfaces {
                let parent = graph.node(interface);
                graph.topology.add_edge(node, parent, EdgeKind::Implements);
            }
        }
        graph
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.topology.add_node(TypeNode {
            name: name.to_string(),
            concrete: false,
        });
        self.index.insert(name.to_string(), idx);
        idx
    }

    pub fn len(&self) -> usize {
        self.topology.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.topology.node_count() == 0
    }

    /// Every type that reaches `name` through any chain of supertype edges.
    pub fn subtypes(&self, name: &str) -> Vec<&TypeNode> {
        let Some(&start) = self.index.get(name) else {
            return Vec::new();
        };
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut found = Vec::new();
        while let Some(idx) = queue.pop_front() {
            for child in self.topology.neighbors_directed(idx, Direction::Incoming) {
                if seen.insert(child) {
                    found.push(&self.topology[child]);
                    queue.push_back(child);
                }
            }
        }
        found
    }
}

/// Finds implementers of a contract in a [`TypeGraph`].
pub trait HierarchyResolver: Send + Sync {
    fn resolve(&self, graph: &TypeGraph, contract: &str) -> BTreeSet<String>;
}

/// Concrete types that reach the contract through any number of
/// intermediate classes or interfaces.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransitiveResolver;

impl HierarchyResolver for TransitiveResolver {
    fn resolve(&self, graph: &TypeGraph, contract: &str) -> BTreeSet<String> {
        graph
            .subtypes(contract)
            .into_iter()
            .filter(|node| node.concrete)
            .map(|node| node.name.clone())
            .collect()
    }
}
