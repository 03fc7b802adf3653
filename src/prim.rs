//! Modified Prim: a greedy multi-criteria maximum spanning arborescence.
//!
//! # Criteria
//! An internal clade `v` is attached from an already included clade `u`
//! maximizing, lexicographically:
//! 1. the frequency of edge `(u, v)`
//! 2. the occurrence count of the candidate `v`
//! 3. ([`MstCriteria::Extended`] only) the occurrence count of `u`
//!
//! A min-heap realizes the maximization by storing reciprocals, with
//! `1/0 = +inf` so zero counts sort last.
//!
//! Leaves do not take part in the relaxation. Each leaf afterwards picks,
//! on its own, the neighbour with the best (frequency, occurrence) pair.
//!
//! # Determinism
//! Heap entries compare `(key, clade id)`. A candidate only replaces the
//! current key of `v` when `(key, parent id)` is strictly smaller, so equal
//! keys go to the smaller parent id whatever the discovery order.

use crate::error::{ConsensusError, Result};
use crate::registry::CladeId;
use crate::supergraph::SuperGraph;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tracing::debug;

/// Which criteria rank candidate edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MstCriteria {
    /// Edge frequency, candidate occurrence, included-node occurrence
    #[default]
    Extended,
    /// Edge frequency, candidate occurrence
    Legacy,
}

/// Reciprocal criteria of one candidate attachment; smaller is better.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Key([f64; 3]);

impl Key {
    const SOURCE: Key = Key([0.0; 3]);
    const UNREACHED: Key = Key([f64::INFINITY; 3]);
}

impl Eq for Key {}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| a.total_cmp(b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[inline]
fn reciprocal(count: u32) -> f64 {
    if count == 0 {
        f64::INFINITY
    } else {
        1.0 / f64::from(count)
    }
}

impl MstCriteria {
    fn key(self, frequency: u32, candidate: u32, included: u32) -> Key {
        let third = match self {
            MstCriteria::Extended => reciprocal(included),
            MstCriteria::Legacy => 0.0,
        };
        Key([reciprocal(frequency), reciprocal(candidate), third])
    }

    fn leaf_key(frequency: u32, parent: u32) -> Key {
        Key([reciprocal(frequency), reciprocal(parent), 0.0])
    }
}

/// Parent of every clade in the extracted spanning structure.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanningTree {
    parent: Vec<Option<CladeId>>,
    root: CladeId,
}

impl SpanningTree {
    #[inline]
    pub fn root(&self) -> CladeId {
        self.root
    }

    /// Parent of `id`; `None` for the root.
    #[inline]
    pub fn parent(&self, id: CladeId) -> Option<CladeId> {
        self.parent.get(id).copied().flatten()
    }

    /// Children lists, each in ascending clade id order.
    pub fn children(&self) -> Vec<Vec<CladeId>> {
        let mut children = vec![Vec::new(); self.parent.len()];
        for (id, parent) in self.parent.iter().enumerate() {
            if let Some(p) = *parent {
                children[p].push(id);
            }
        }
        children
    }
}

/// Extract the spanning arborescence of `graph` rooted at its root clade.
///
/// # Errors
/// `DisconnectedGraph` if an internal clade cannot be reached from the
/// root through internal clades, or a leaf has no neighbour at all.
pub fn modified_prim(graph: &SuperGraph, criteria: MstCriteria) -> Result<SpanningTree> {
    let n = graph.node_count();
    let root = graph.root();

    let mut key = vec![Key::UNREACHED; n];
    let mut parent: Vec<Option<CladeId>> = vec![None; n];
    let mut included = vec![false; n];

    let mut heap = BinaryHeap::new();
    key[root] = Key::SOURCE;
    heap.push(Reverse((Key::SOURCE, root)));

    while let Some(Reverse((_, u))) = heap.pop() {
        if included[u] {
            continue; // stale entry
        }
        included[u] = true;

        for &v in graph.neighbors(u) {
            if graph.is_leaf(v) || included[v] {
                continue;
            }
            let Some(edge) = graph.edge(u, v) else {
                continue;
            };
            let candidate = criteria.key(edge.frequency, graph.occurrences(v), graph.occurrences(u));
            let current = (key[v], parent[v].unwrap_or(CladeId::MAX));
            if (candidate, u) < current {
                key[v] = candidate;
                parent[v] = Some(u);
                heap.push(Reverse((candidate, v)));
            }
        }
    }

    if let Some(clade) = (0..n).find(|&id| !graph.is_leaf(id) && id != root && !included[id]) {
        return Err(ConsensusError::DisconnectedGraph { clade });
    }

    // Leaves: independent one-hop decision each
    for u in (0..n).filter(|&id| graph.is_leaf(id)) {
        let best = graph
            .neighbors(u)
            .iter()
            .filter_map(|&v| {
                let edge = graph.edge(u, v)?;
                Some((MstCriteria::leaf_key(edge.frequency, graph.occurrences(v)), v))
            })
            .min();
        match best {
            Some((_, v)) => parent[u] = Some(v),
            None => return Err(ConsensusError::DisconnectedGraph { clade: u }),
        }
    }

    debug!(?criteria, clades = n, "spanning tree extracted");
    Ok(SpanningTree { parent, root })
}
