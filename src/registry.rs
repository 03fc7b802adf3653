//! Stable integer identities for clades.
//!
//! # Id layout
//! - `0..n`: the taxa, in the order their leaves appear (pre-order) in the
//!   first input tree
//! - `n`: the root clade (all taxa)
//! - `n+1..`: every other clade, in first-seen order while scanning inputs
//!
//! The registry is write-once, read-many within one consensus call: ids are
//! never removed or reassigned.

use crate::bitset::Bitset;
use crate::error::{ConsensusError, Result};
use crate::snapshot::preorder;
use phylotree::tree::Tree as PhyloTree;
use std::collections::HashMap;

/// Integer identity of a clade.
pub type CladeId = usize;

#[derive(Debug, Clone)]
pub struct CladeRegistry {
    /// Taxon names; index = leaf CladeId = bit index
    taxa: Vec<String>,

    /// Reverse of `taxa`
    taxon_index: HashMap<String, usize>,

    /// Clade → id, memoized by leaf-set equality
    ids: HashMap<Bitset, CladeId>,
}

impl CladeRegistry {
    /// Preallocate leaf ids and the root id from the first tree of `trees`.
    ///
    /// # Errors
    /// - `EmptyInput` if `trees` is empty
    /// - `UnnamedLeaf` / `DuplicateTaxon` if the first tree has bad leaves
    /// - `TooFewTaxa` with fewer than 2 taxa (the root clade would equal the leaf clade)
    pub fn from_trees(trees: &[PhyloTree]) -> Result<Self> {
        let first = trees.first().ok_or(ConsensusError::EmptyInput)?;

        let mut taxa = Vec::new();
        let mut taxon_index = HashMap::new();
        for node_id in preorder(first)? {
            let node = first.get(&node_id)?;
            if !node.children.is_empty() {
                continue;
            }
            let name = node.name.clone().ok_or(ConsensusError::UnnamedLeaf { tree: 0 })?;
            if taxon_index.contains_key(&name) {
                return Err(ConsensusError::DuplicateTaxon { tree: 0, taxon: name });
            }
            taxon_index.insert(name.clone(), taxa.len());
            taxa.push(name);
        }

        Self::from_taxa(taxa, taxon_index)
    }

    fn from_taxa(taxa: Vec<String>, taxon_index: HashMap<String, usize>) -> Result<Self> {
        let n = taxa.len();
        if n < 2 {
            return Err(ConsensusError::TooFewTaxa { found: n });
        }

        let words = Bitset::words_for(n);
        let mut registry = CladeRegistry {
            taxa,
            taxon_index,
            ids: HashMap::with_capacity(2 * n),
        };
        for idx in 0..n {
            registry.clade_id(&Bitset::singleton(words, idx));
        }
        registry.clade_id(&Bitset::full(n));
        Ok(registry)
    }

    /// Id of `clade`, allocating the next unused id on first sight.
    pub fn clade_id(&mut self, clade: &Bitset) -> CladeId {
        if let Some(&id) = self.ids.get(clade) {
            return id;
        }
        let id = self.ids.len();
        self.ids.insert(clade.clone(), id);
        id
    }

    /// Id of `clade` if it was already seen.
    pub fn get(&self, clade: &Bitset) -> Option<CladeId> {
        self.ids.get(clade).copied()
    }

    /// Id of the root clade.
    #[inline]
    pub fn root(&self) -> CladeId {
        self.taxa.len()
    }

    #[inline]
    pub fn num_taxa(&self) -> usize {
        self.taxa.len()
    }

    /// Number of distinct clades registered so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    pub fn is_leaf(&self, id: CladeId) -> bool {
        id < self.taxa.len()
    }

    /// Taxon name of leaf clade `id` (`None` for internal clades).
    pub fn taxon(&self, id: CladeId) -> Option<&str> {
        self.taxa.get(id).map(String::as_str)
    }

    /// Taxon name → bit index, used to build clades of further trees.
    pub fn taxon_index(&self) -> &HashMap<String, usize> {
        &self.taxon_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(newick: &str) -> PhyloTree {
        PhyloTree::from_newick(newick).unwrap()
    }

    #[test]
    fn test_leaf_and_root_ids_preallocated() {
        let reg = CladeRegistry::from_trees(&[tree("((C:1,A:1):1,B:1);")]).unwrap();
        let taxa: Vec<_> = (0..3).filter_map(|id| reg.taxon(id)).collect();
        assert_eq!(taxa, vec!["C", "A", "B"]);
        assert_eq!(reg.root(), 3);
        assert_eq!(reg.len(), 4);
        assert_eq!(reg.get(&Bitset::full(3)), Some(3));
        assert_eq!(reg.taxon(1), Some("A"));
        assert_eq!(reg.taxon(3), None);
        assert!(reg.is_leaf(2));
        assert!(!reg.is_leaf(3));
    }

    #[test]
    fn test_clade_id_is_memoized_by_leaf_set() {
        let mut reg = CladeRegistry::from_trees(&[tree("(A:1,(B:1,C:1):1);")]).unwrap();

        let mut bc = Bitset::singleton(1, 1);
        bc.set(2);
        let mut cb = Bitset::singleton(1, 2);
        cb.set(1);

        let first = reg.clade_id(&bc);
        assert_eq!(first, 4);
        assert_eq!(reg.clade_id(&cb), first);

        let mut ab = Bitset::singleton(1, 0);
        ab.set(1);
        assert_eq!(reg.clade_id(&ab), 5);
        assert_eq!(reg.get(&ab), Some(5));
        assert_eq!(reg.len(), 6);
    }

    #[test]
    fn test_registry_errors() {
        assert!(matches!(
            CladeRegistry::from_trees(&[]),
            Err(ConsensusError::EmptyInput)
        ));
        assert!(matches!(
            CladeRegistry::from_trees(&[tree("(A:1);")]),
            Err(ConsensusError::TooFewTaxa { found: 1 })
        ));
        assert!(matches!(
            CladeRegistry::from_trees(&[tree("(A:1,A:1);")]),
            Err(ConsensusError::DuplicateTaxon { tree: 0, .. })
        ));
    }
}
