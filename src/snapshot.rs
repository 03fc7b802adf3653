//! Pre-order clade snapshots of input trees.
//!
//! # Overview
//! A TreeSnapshot captures, for every node of one input tree, the clade
//! (leaf set) below it, the slot of its parent and the length of the branch
//! leading to it. Slots are in pre-order, so a parent always comes before
//! its children. This is the only view of an input tree the super-graph
//! builder ever needs.
//!
//! # CRITICAL: taxon NAMES, not node IDs
//! Node IDs are assigned during tree parsing and differ across trees.
//! Taxon names are consistent, so clades are built from the taxon index
//! the registry assigned to each name.

use crate::bitset::Bitset;
use crate::error::{ConsensusError, Result};
use phylotree::tree::Tree as PhyloTree;
use std::collections::HashMap;

/// Node IDs of `tree` in pre-order (parent before children, children in
/// their stored order).
pub fn preorder(tree: &PhyloTree) -> Result<Vec<usize>> {
    let root_id = tree.get_root()?;
    let mut order = Vec::new();
    let mut stack = vec![root_id];
    while let Some(node_id) = stack.pop() {
        order.push(node_id);
        let node = tree.get(&node_id)?;
        // Reverse so the first child is visited first
        stack.extend(node.children.iter().rev().copied());
    }
    Ok(order)
}

/// One node of a snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotNode {
    /// Taxa below this node
    pub clade: Bitset,

    /// Pre-order slot of the parent; `None` for the tree's root
    pub parent: Option<usize>,

    /// Length of the branch leading to this node (missing lengths read as 0.0)
    pub length: f64,
}

/// An immutable pre-order snapshot of one input tree.
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    /// Nodes in pre-order; slot 0 is the root
    pub nodes: Vec<SnapshotNode>,
}

impl TreeSnapshot {
    /// Extract a snapshot from a phylogenetic tree.
    ///
    /// # Parameters
    /// - `tree`: the input tree
    /// - `tree_index`: position of the tree in the input batch, for error reports
    /// - `taxon_index`: taxon name → bit index, fixed by the first tree
    ///
    /// # Algorithm
    /// 1. Walk the tree in pre-order, recording parent slots and branch lengths
    /// 2. Walk the slots backwards (children before parents), building clades:
    ///    a leaf sets its taxon bit, an internal node ORs its children
    /// 3. Check that every taxon of the registry was seen exactly once
    ///
    /// # Errors
    /// `UnnamedLeaf`, `DuplicateTaxon` or `TaxonMismatch` when the tree does
    /// not carry exactly the registry's taxa; `Tree` if the tree is malformed.
    pub fn from_tree(
        tree: &PhyloTree,
        tree_index: usize,
        taxon_index: &HashMap<String, usize>,
    ) -> Result<Self> {
        let order = preorder(tree)?;
        let words = Bitset::words_for(taxon_index.len());

        // Step 1: node_id → slot, then parent slots and lengths
        let slot_of: HashMap<usize, usize> = order
            .iter()
            .enumerate()
            .map(|(slot, &node_id)| (node_id, slot))
            .collect();

        let mut nodes = Vec::with_capacity(order.len());
        for &node_id in &order {
            let node = tree.get(&node_id)?;
            let parent = node.parent.and_then(|p| slot_of.get(&p).copied());
            nodes.push(SnapshotNode {
                clade: Bitset::zeros(words),
                parent,
                length: node.parent_edge.unwrap_or(0.0),
            });
        }

        // Step 2: clades bottom-up
        let mut seen = Bitset::zeros(words);
        for slot in (0..order.len()).rev() {
            let node = tree.get(&order[slot])?;
            if node.children.is_empty() {
                let name = node
                    .name
                    .as_deref()
                    .ok_or(ConsensusError::UnnamedLeaf { tree: tree_index })?;
                let &idx = taxon_index.get(name).ok_or_else(|| ConsensusError::TaxonMismatch {
                    tree: tree_index,
                    reason: format!("unknown taxon '{name}'"),
                })?;
                if seen.contains(idx) {
                    return Err(ConsensusError::DuplicateTaxon {
                        tree: tree_index,
                        taxon: name.to_string(),
                    });
                }
                seen.set(idx);
                nodes[slot].clade.set(idx);
            }

            if let Some(parent) = nodes[slot].parent {
                let clade = nodes[slot].clade.clone();
                nodes[parent].clade.or_assign(&clade);
            }
        }

        // Step 3: no taxon left out
        let found = seen.count_ones();
        if found != taxon_index.len() {
            return Err(ConsensusError::TaxonMismatch {
                tree: tree_index,
                reason: format!(
                    "has {found} of the {} taxa of tree 0",
                    taxon_index.len()
                ),
            });
        }

        Ok(TreeSnapshot { nodes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(names: &[&str]) -> HashMap<String, usize> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.to_string(), i))
            .collect()
    }

    /// ```text
    ///       root
    ///      /    \
    ///     A     node1 (length: 0.5)
    ///           /   \
    ///          B     C
    /// ```
    #[test]
    fn test_snapshot_preorder_clades() {
        let tree = PhyloTree::from_newick("(A:1,(B:2,C:3):0.5);").unwrap();
        let snap = TreeSnapshot::from_tree(&tree, 0, &index_of(&["A", "B", "C"])).unwrap();

        let clades: Vec<u64> = snap.nodes.iter().map(|n| n.clade.0[0]).collect();
        assert_eq!(clades, vec![0b111, 0b001, 0b110, 0b010, 0b100]);

        let parents: Vec<Option<usize>> = snap.nodes.iter().map(|n| n.parent).collect();
        assert_eq!(parents, vec![None, Some(0), Some(0), Some(2), Some(2)]);

        let lengths: Vec<f64> = snap.nodes.iter().skip(1).map(|n| n.length).collect();
        assert_eq!(lengths, vec![1.0, 0.5, 2.0, 3.0]);
    }

    #[test]
    fn test_missing_lengths_read_as_zero() {
        let tree = PhyloTree::from_newick("(A,(B,C));").unwrap();
        let snap = TreeSnapshot::from_tree(&tree, 0, &index_of(&["A", "B", "C"])).unwrap();
        assert!(snap.nodes.iter().all(|n| n.length == 0.0));
    }

    #[test]
    fn test_taxon_set_is_validated() {
        let taxa = index_of(&["A", "B", "C"]);

        let unknown = PhyloTree::from_newick("(A:1,(B:1,D:1):1);").unwrap();
        assert!(matches!(
            TreeSnapshot::from_tree(&unknown, 2, &taxa),
            Err(ConsensusError::TaxonMismatch { tree: 2, .. })
        ));

        let missing = PhyloTree::from_newick("(A:1,B:1);").unwrap();
        assert!(matches!(
            TreeSnapshot::from_tree(&missing, 1, &taxa),
            Err(ConsensusError::TaxonMismatch { tree: 1, .. })
        ));

        let duplicate = PhyloTree::from_newick("(A:1,(B:1,(C:1,A:1):1):1);").unwrap();
        assert!(matches!(
            TreeSnapshot::from_tree(&duplicate, 3, &taxa),
            Err(ConsensusError::DuplicateTaxon { tree: 3, .. })
        ));
    }
}
