//! Module graph owning the shared units of one build.
//!
//! Units are deduplicated by identifier. Building links each unit to the
//! local modules it depends on; the chunk graph derived from it gives those
//! modules ids and places lazily loaded ones in their own chunks.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rayon::prelude::*;
use tracing::debug;

use crate::builder::module::{BuildError, BuildUnit, RequestShortener, SharedModule};

/// Id of the chunk loaded at startup.
pub const INITIAL_CHUNK: &str = "main";

/// A node in the module graph.
#[derive(Debug, Clone)]
pub enum GraphNode {
    Shared(SharedModule),
    /// A local module, with its file once resolved.
    Local {
        request: String,
        path: Option<PathBuf>,
    },
}

/// How a dependency is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Sync,
    Async,
}

/// Maps a local request to a file.
pub trait LocalResolver: Sync {
    fn resolve(&self, request: &str) -> Option<PathBuf>;
}

impl<F> LocalResolver for F
where
    F: Fn(&str) -> Option<PathBuf> + Sync,
{
    fn resolve(&self, request: &str) -> Option<PathBuf> {
        self(request)
    }
}

#[derive(Debug, Default)]
pub struct ModuleGraph {
    graph: DiGraph<GraphNode, EdgeKind>,
    shared: HashMap<String, NodeIndex>,
    local: HashMap<String, NodeIndex>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit unless one with the same identifier exists.
    ///
    /// Returns the node and whether it was newly inserted.
    pub fn add_unit(&mut self, unit: SharedModule) -> (NodeIndex, bool) {
        let identifier = unit.identifier();
        if let Some(&index) = self.shared.get(&identifier) {
            debug!("dedupe {}", identifier);
            return (index, false);
        }

        let index = self.graph.add_node(GraphNode::Shared(unit));
        self.shared.insert(identifier, index);
        (index, true)
    }

    pub fn unit_count(&self) -> usize {
        self.shared.len()
    }

    /// Shared units in insertion order.
    pub fn units(&self) -> impl Iterator<Item = &SharedModule> {
        self.graph.node_weights().filter_map(|node| match node {
            GraphNode::Shared(unit) => Some(unit),
            GraphNode::Local { .. } => None,
        })
    }

    pub fn unit(&self, identifier: &str) -> Option<&SharedModule> {
        self.shared
            .get(identifier)
            .and_then(|&index| match &self.graph[index] {
                GraphNode::Shared(unit) => Some(unit),
                GraphNode::Local { .. } => None,
            })
    }

    /// Local modules with their resolved paths.
    pub fn locals(&self) -> impl Iterator<Item = (&str, Option<&PathBuf>)> {
        self.graph.node_weights().filter_map(|node| match node {
            GraphNode::Local { request, path } => Some((request.as_str(), path.as_ref())),
            GraphNode::Shared(_) => None,
        })
    }

    /// Build every unit that needs it, in parallel, then link dependencies.
    ///
    /// Returns the identifiers built and the errors of units that failed.
    pub fn build_all(&mut self, resolver: &dyn LocalResolver) -> (Vec<String>, Vec<BuildError>) {
        let outcomes: Vec<(String, Result<(), BuildError>)> = self
            .graph
            .node_weights_mut()
            .par_bridge()
            .filter_map(|node| match node {
                GraphNode::Shared(unit) if unit.need_build() => {
                    Some((unit.identifier(), unit.build()))
                }
                _ => None,
            })
            .collect();

        let mut built = Vec::new();
        let mut errors = Vec::new();
        for (identifier, outcome) in outcomes {
            match outcome {
                Ok(()) => built.push(identifier),
                Err(e) => errors.push(e),
            }
        }
        built.sort();

        self.link(resolver);
        (built, errors)
    }

    fn link(&mut self, resolver: &dyn LocalResolver) {
        let mut edges = Vec::new();
        for index in self.graph.node_indices() {
            if let GraphNode::Shared(unit) = &self.graph[index] {
                for dep in unit.dependencies() {
                    edges.push((index, dep.request.clone(), EdgeKind::Sync));
                }
                for block in unit.blocks() {
                    for dep in &block.dependencies {
                        edges.push((index, dep.request.clone(), EdgeKind::Async));
                    }
                }
            }
        }

        for (from, request, kind) in edges {
            let to = self.local_node(&request, resolver);
            if self.graph.find_edge(from, to).is_none() {
                self.graph.add_edge(from, to, kind);
            }
        }
    }

    fn local_node(&mut self, request: &str, resolver: &dyn LocalResolver) -> NodeIndex {
        if let Some(&index) = self.local.get(request) {
            return index;
        }
        let index = self.graph.add_node(GraphNode::Local {
            request: request.to_string(),
            path: resolver.resolve(request),
        });
        self.local.insert(request.to_string(), index);
        index
    }

    /// Assign module and chunk ids to local modules.
    ///
    /// A module reached synchronously lives in the initial chunk; one reached
    /// only through async blocks gets a chunk of its own.
    pub fn chunk_graph(&self, shortener: &RequestShortener) -> ChunkGraph {
        let mut chunks = ChunkGraph::default();

        for (request, &index) in &self.local {
            let GraphNode::Local { path: Some(path), .. } = &self.graph[index] else {
                continue;
            };
            let id = shortener.shorten(&path.to_string_lossy());
            chunks.insert_module(request, &id);

            let sync = self
                .graph
                .edges_directed(index, Direction::Incoming)
                .any(|edge| *edge.weight() == EdgeKind::Sync);
            if sync {
                chunks.add_chunk(request, INITIAL_CHUNK);
            } else {
                chunks.add_chunk(request, &chunk_name(&id));
            }
        }

        chunks
    }
}

/// Chunk id derived from a module id.
pub fn chunk_name(module_id: &str) -> String {
    module_id
        .trim_start_matches("./")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Module ids and chunk membership of local modules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkGraph {
    module_ids: BTreeMap<String, String>,
    chunks: BTreeMap<String, Vec<String>>,
}

impl ChunkGraph {
    pub fn insert_module(&mut self, request: &str, id: &str) {
        self.module_ids.insert(request.to_string(), id.to_string());
    }

    pub fn add_chunk(&mut self, request: &str, chunk_id: &str) {
        let chunks = self.chunks.entry(request.to_string()).or_default();
        if !chunks.iter().any(|c| c == chunk_id) {
            chunks.push(chunk_id.to_string());
        }
    }

    pub fn module_id(&self, request: &str) -> Option<&str> {
        self.module_ids.get(request).map(String::as_str)
    }

    /// Chunks that must be loaded before `request` is available.
    ///
    /// Modules in the initial chunk need none.
    pub fn chunks_of(&self, request: &str) -> Vec<String> {
        match self.chunks.get(request) {
            Some(chunks) if chunks.iter().any(|c| c == INITIAL_CHUNK) => Vec::new(),
            Some(chunks) => chunks.clone(),
            None => Vec::new(),
        }
    }
}
