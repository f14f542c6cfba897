//! File-level build graph
//!
//! Folds the symbol store's records into a graph over defining files, for
//! build ordering and rebuild invalidation. Uses petgraph for graph
//! operations.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use thiserror::Error;

use super::symbol::SymbolInfo;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Dependency cycle through {}", .0.display())]
    Cycle(PathBuf),

    #[error("File not in build graph: {}", .0.display())]
    FileNotFound(PathBuf),
}

/// A dependency graph between defining files
///
/// The edge direction is: prerequisite file -> dependent file. This means
/// "the prerequisite file must be built before the dependent".
#[derive(Debug, Default)]
pub struct BuildGraph {
    graph: DiGraph<PathBuf, ()>,

    /// Map from file to node index
    node_map: BTreeMap<PathBuf, NodeIndex>,
}

impl BuildGraph {
    /// Creates an empty build graph
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: BTreeMap::new(),
        }
    }

    /// Builds a graph from store records
    ///
    /// A prerequisite name defined in several files links to every one of
    /// them; names with no definition contribute no edge.
    pub fn from_records(records: &[SymbolInfo]) -> Self {
        let mut graph = Self::new();

        let mut definers: BTreeMap<&str, BTreeSet<&Path>> = BTreeMap::new();
        for record in records {
            graph.add_file(record.symbol.file.clone());
            definers
                .entry(record.symbol.name.as_str())
                .or_default()
                .insert(record.symbol.file());
        }

        for record in records {
            for prerequisite in &record.prerequisites {
                let Some(files) = definers.get(prerequisite.as_str()) else {
                    continue;
                };
                for file in files {
                    graph.add_dependency(record.symbol.file(), file);
                }
            }
        }

        graph
    }

    /// Adds a file to the graph
    pub fn add_file(&mut self, file: PathBuf) {
        if !self.node_map.contains_key(&file) {
            let idx = self.graph.add_node(file.clone());
            self.node_map.insert(file, idx);
        }
    }

    /// Adds an edge: `file` depends on `prerequisite`
    ///
    /// Edges within one file and repeated edges are ignored.
    pub fn add_dependency(&mut self, file: &Path, prerequisite: &Path) {
        if file == prerequisite {
            return;
        }

        self.add_file(file.to_path_buf());
        self.add_file(prerequisite.to_path_buf());

        let file_idx = self.node_map[file];
        let prerequisite_idx = self.node_map[prerequisite];

        if self.graph.find_edge(prerequisite_idx, file_idx).is_none() {
            self.graph.add_edge(prerequisite_idx, file_idx, ());
        }
    }

    /// Returns the files `file` directly depends on
    pub fn dependencies(&self, file: &Path) -> Vec<PathBuf> {
        self.neighbours(file, petgraph::Direction::Incoming)
    }

    /// Returns the files that directly depend on `file`
    pub fn dependents(&self, file: &Path) -> Vec<PathBuf> {
        self.neighbours(file, petgraph::Direction::Outgoing)
    }

    fn neighbours(&self, file: &Path, direction: petgraph::Direction) -> Vec<PathBuf> {
        let Some(idx) = self.node_map.get(file) else {
            return vec![];
        };

        let mut files: Vec<PathBuf> = self
            .graph
            .neighbors_directed(*idx, direction)
            .filter_map(|idx| self.graph.node_weight(idx).cloned())
            .collect();
        files.sort();
        files
    }

    /// Returns every file that must be rebuilt when `file` changes,
    /// excluding `file` itself, sorted
    pub fn affected_by(&self, file: &Path) -> Result<Vec<PathBuf>, GraphError> {
        let start = *self
            .node_map
            .get(file)
            .ok_or_else(|| GraphError::FileNotFound(file.to_path_buf()))?;

        let mut affected = BTreeSet::new();
        let mut bfs = Bfs::new(&self.graph, start);
        while let Some(idx) = bfs.next(&self.graph) {
            if idx != start {
                affected.insert(self.graph[idx].clone());
            }
        }

        Ok(affected.into_iter().collect())
    }

    /// Returns all files in build order (prerequisites before dependents)
    pub fn build_order(&self) -> Result<Vec<PathBuf>, GraphError> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order
                .into_iter()
                .filter_map(|idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => Err(GraphError::Cycle(self.graph[cycle.node_id()].clone())),
        }
    }

    /// Returns true if the graph contains the file
    pub fn contains(&self, file: &Path) -> bool {
        self.node_map.contains_key(file)
    }

    /// Returns the number of files in the graph
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }
}
