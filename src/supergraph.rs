//! The super-graph: every distinct clade of an input batch, aggregated.
//!
//! # Overview
//! Each input tree contributes its parent→child relations. Nodes with the
//! same leaf set (from any tree) collapse into one super-graph node, so the
//! graph records:
//! - per clade: in how many trees it appears as a non-root node
//! - per unordered clade pair: in how many trees the pair is a parent–child
//!   relation, and the average length of that branch
//!
//! Aggregation is sums and counts only, so the order in which trees are
//! ingested does not matter (except for the cosmetic id allocation order).

use crate::error::Result;
use crate::registry::{CladeId, CladeRegistry};
use crate::snapshot::TreeSnapshot;
use phylotree::tree::Tree as PhyloTree;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Aggregated statistics of one super-graph edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeStats {
    /// Number of input trees exhibiting this parent–child relation
    pub frequency: u32,

    /// Mean of the observed branch lengths
    pub avg_length: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct EdgeAccumulator {
    frequency: u32,
    total_length: f64,
}

/// Undirected edge key: the two clade ids in ascending order.
#[inline]
fn edge_key(u: CladeId, v: CladeId) -> (CladeId, CladeId) {
    if u <= v { (u, v) } else { (v, u) }
}

/// Plain-data view of one input batch: the clade registry seeded from its
/// first tree, and a validated snapshot of every tree.
///
/// phylotree trees cache through `RefCell`s and cannot cross threads; a
/// `BatchSnapshot` can, so batches are snapshotted first and aggregated in
/// parallel afterwards.
#[derive(Debug, Clone)]
pub struct BatchSnapshot {
    registry: CladeRegistry,
    snapshots: Vec<TreeSnapshot>,
}

impl BatchSnapshot {
    /// # Errors
    /// `EmptyInput` for an empty batch; taxon errors if any tree does not
    /// carry exactly the taxa of the first one.
    pub fn from_trees(trees: &[PhyloTree]) -> Result<Self> {
        let registry = CladeRegistry::from_trees(trees)?;
        let snapshots = trees
            .iter()
            .enumerate()
            .map(|(index, tree)| TreeSnapshot::from_tree(tree, index, registry.taxon_index()))
            .collect::<Result<Vec<_>>>()?;
        Ok(BatchSnapshot { registry, snapshots })
    }

    /// Number of trees in the batch.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Folds input trees one by one into a super-graph.
#[derive(Debug, Clone)]
pub struct SuperGraphBuilder {
    registry: CladeRegistry,
    occurrences: Vec<u32>,
    edges: HashMap<(CladeId, CladeId), EdgeAccumulator>,
    adjacency: Vec<Vec<CladeId>>,
    num_trees: usize,
}

impl SuperGraphBuilder {
    pub fn new(registry: CladeRegistry) -> Self {
        let len = registry.len();
        SuperGraphBuilder {
            registry,
            occurrences: vec![0; len],
            edges: HashMap::new(),
            adjacency: vec![Vec::new(); len],
            num_trees: 0,
        }
    }

    /// Ingest one tree: validate its taxa, then fold its relations in.
    pub fn ingest(&mut self, tree: &PhyloTree) -> Result<()> {
        let snapshot = TreeSnapshot::from_tree(tree, self.num_trees, self.registry.taxon_index())?;
        self.ingest_snapshot(&snapshot);
        Ok(())
    }

    /// Fold one already validated snapshot in.
    ///
    /// Nodes are visited in pre-order, so a parent's clade id is always
    /// resolved before its children's.
    pub fn ingest_snapshot(&mut self, snapshot: &TreeSnapshot) {
        let mut ids: Vec<CladeId> = Vec::with_capacity(snapshot.nodes.len());

        for node in &snapshot.nodes {
            let id = self.registry.clade_id(&node.clade);
            self.grow_to(id + 1);
            ids.push(id);

            let Some(parent_slot) = node.parent else {
                continue;
            };
            self.occurrences[id] += 1;

            let parent_id = ids[parent_slot];
            if parent_id == id {
                // Unary input node: same clade as its only child
                trace!(clade = id, "skipping self relation");
                continue;
            }

            let key = edge_key(parent_id, id);
            let edge = self.edges.entry(key).or_insert_with(|| {
                self.adjacency[parent_id].push(id);
                self.adjacency[id].push(parent_id);
                EdgeAccumulator::default()
            });
            edge.frequency += 1;
            edge.total_length += node.length;
        }

        self.num_trees += 1;
    }

    fn grow_to(&mut self, len: usize) {
        if self.occurrences.len() < len {
            self.occurrences.resize(len, 0);
            self.adjacency.resize_with(len, Vec::new);
        }
    }

    /// Turn cumulative lengths into averages.
    pub fn finish(self) -> SuperGraph {
        let edges = self
            .edges
            .into_iter()
            .map(|(key, acc)| {
                let stats = EdgeStats {
                    frequency: acc.frequency,
                    avg_length: acc.total_length / f64::from(acc.frequency),
                };
                (key, stats)
            })
            .collect();

        SuperGraph {
            registry: self.registry,
            occurrences: self.occurrences,
            edges,
            adjacency: self.adjacency,
            num_trees: self.num_trees,
        }
    }
}

/// The aggregated, finalized super-graph of one input batch.
#[derive(Debug, Clone)]
pub struct SuperGraph {
    registry: CladeRegistry,
    occurrences: Vec<u32>,
    edges: HashMap<(CladeId, CladeId), EdgeStats>,
    adjacency: Vec<Vec<CladeId>>,
    num_trees: usize,
}

impl SuperGraph {
    /// Build the super-graph of `trees`.
    ///
    /// # Errors
    /// `EmptyInput` for an empty batch; taxon errors if any tree does not
    /// carry exactly the taxa of the first one.
    pub fn build(trees: &[PhyloTree]) -> Result<Self> {
        Ok(Self::from_snapshots(BatchSnapshot::from_trees(trees)?))
    }

    /// Build the super-graph of an already snapshotted batch.
    pub fn from_snapshots(batch: BatchSnapshot) -> Self {
        let mut builder = SuperGraphBuilder::new(batch.registry);
        for snapshot in &batch.snapshots {
            builder.ingest_snapshot(snapshot);
        }
        let graph = builder.finish();
        debug!(
            trees = graph.num_trees,
            taxa = graph.registry.num_taxa(),
            clades = graph.node_count(),
            edges = graph.edge_count(),
            "super-graph built"
        );
        graph
    }

    pub fn registry(&self) -> &CladeRegistry {
        &self.registry
    }

    #[inline]
    pub fn root(&self) -> CladeId {
        self.registry.root()
    }

    #[inline]
    pub fn is_leaf(&self, id: CladeId) -> bool {
        self.registry.is_leaf(id)
    }

    pub fn num_trees(&self) -> usize {
        self.num_trees
    }

    pub fn node_count(&self) -> usize {
        self.occurrences.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of trees in which clade `id` is a non-root node.
    #[inline]
    pub fn occurrences(&self, id: CladeId) -> u32 {
        self.occurrences.get(id).copied().unwrap_or(0)
    }

    /// Statistics of the edge between `u` and `v`, in either direction.
    #[inline]
    pub fn edge(&self, u: CladeId, v: CladeId) -> Option<&EdgeStats> {
        self.edges.get(&edge_key(u, v))
    }

    /// Neighbours of `id`, in the order their edges were first seen.
    pub fn neighbors(&self, id: CladeId) -> &[CladeId] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
impl SuperGraph {
    /// Graph over the clades of `registry` with the given `(u, v, frequency)`
    /// edges. Every clade but the root occurs once; every length is 1.0.
    pub(crate) fn from_edges(registry: CladeRegistry, edges: &[(CladeId, CladeId, u32)]) -> Self {
        let len = registry.len();
        let mut occurrences = vec![1; len];
        occurrences[registry.root()] = 0;
        let mut adjacency = vec![Vec::new(); len];
        let mut stats = HashMap::new();
        for &(u, v, frequency) in edges {
            adjacency[u].push(v);
            adjacency[v].push(u);
            stats.insert(edge_key(u, v), EdgeStats { frequency, avg_length: 1.0 });
        }
        SuperGraph {
            registry,
            occurrences,
            edges: stats,
            adjacency,
            num_trees: 1,
        }
    }
}
