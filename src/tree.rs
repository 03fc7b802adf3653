//! Arena representation of reconstructed and consensus trees.
//!
//! Nodes live in one vector and refer to each other by index: a parent
//! index and a list of child indices. There are no back-references to keep
//! alive, and simplification rebuilds a fresh arena instead of deleting
//! nodes from a live one.

use crate::error::Result;
use crate::registry::CladeId;
use phylotree::tree::{Node as PhyloNode, Tree as PhyloTree};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Index of a node in a [`ConsensusTree`].
pub type NodeIndex = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Super-graph clade this node stands for
    pub clade: Option<CladeId>,

    /// Taxon name; set on leaves of a finished consensus tree
    pub name: Option<String>,

    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,

    /// Length of the branch leading to this node; `None` on the root
    pub length: Option<f64>,
}

impl TreeNode {
    fn new(clade: Option<CladeId>, name: Option<String>, length: Option<f64>) -> Self {
        TreeNode {
            clade,
            name,
            parent: None,
            children: Vec::new(),
            length,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A rooted tree of named nodes with per-edge branch lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusTree {
    nodes: Vec<TreeNode>,
    root: NodeIndex,
}

impl ConsensusTree {
    /// A tree made of a single root node.
    pub fn with_root(clade: Option<CladeId>, name: Option<String>) -> Self {
        ConsensusTree {
            nodes: vec![TreeNode::new(clade, name, None)],
            root: 0,
        }
    }

    /// Append a child below `parent`, returning its index.
    pub fn add_child(
        &mut self,
        parent: NodeIndex,
        clade: Option<CladeId>,
        name: Option<String>,
        length: Option<f64>,
    ) -> NodeIndex {
        let index = self.nodes.len();
        let mut node = TreeNode::new(clade, name, length);
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent].children.push(index);
        index
    }

    #[inline]
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    #[inline]
    pub fn node(&self, index: NodeIndex) -> &TreeNode {
        &self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node indices, parents before children.
    pub fn preorder(&self) -> Vec<NodeIndex> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            order.push(index);
            stack.extend(self.nodes[index].children.iter().rev().copied());
        }
        order
    }

    /// Node indices, every child before its parent.
    pub fn postorder(&self) -> Vec<NodeIndex> {
        let mut order = Vec::with_capacity(self.nodes.len());
        // (node, children already expanded)
        let mut stack = vec![(self.root, false)];
        while let Some((index, expanded)) = stack.pop() {
            if expanded {
                order.push(index);
            } else {
                stack.push((index, true));
                stack.extend(self.nodes[index].children.iter().rev().map(|&c| (c, false)));
            }
        }
        order
    }

    /// Node indices in breadth-first order.
    pub fn levelorder(&self) -> Vec<NodeIndex> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::from([self.root]);
        while let Some(index) = queue.pop_front() {
            order.push(index);
            queue.extend(self.nodes[index].children.iter().copied());
        }
        order
    }

    /// Leaf indices in pre-order.
    pub fn leaves(&self) -> Vec<NodeIndex> {
        self.preorder()
            .into_iter()
            .filter(|&i| self.nodes[i].is_leaf())
            .collect()
    }

    /// Leaf names in pre-order (unnamed leaves are skipped).
    pub fn leaf_names(&self) -> Vec<String> {
        self.leaves()
            .into_iter()
            .filter_map(|i| self.nodes[i].name.clone())
            .collect()
    }

    /// Sorted taxon names below every node.
    fn taxa_below(&self) -> Vec<Vec<String>> {
        let mut below: Vec<Vec<String>> = vec![Vec::new(); self.nodes.len()];
        for index in self.postorder() {
            let node = &self.nodes[index];
            let mut taxa: Vec<String> = if node.is_leaf() {
                node.name.iter().cloned().collect()
            } else {
                node.children
                    .iter()
                    .flat_map(|&c| below[c].iter().cloned())
                    .collect()
            };
            taxa.sort_unstable();
            below[index] = taxa;
        }
        below
    }

    /// Clades of the internal non-root nodes, each as sorted taxon names.
    pub fn clades(&self) -> BTreeSet<Vec<String>> {
        let below = self.taxa_below();
        (0..self.nodes.len())
            .filter(|&i| i != self.root && !self.nodes[i].is_leaf())
            .map(|i| below[i].clone())
            .collect()
    }

    /// Node whose leaf set is exactly `taxa` (in any order).
    pub fn find_clade(&self, taxa: &[&str]) -> Option<NodeIndex> {
        let mut wanted: Vec<String> = taxa.iter().map(|t| t.to_string()).collect();
        wanted.sort_unstable();
        self.taxa_below().iter().position(|t| *t == wanted)
    }

    /// Branch length above the node whose leaf set is `taxa`.
    pub fn length_of_clade(&self, taxa: &[&str]) -> Option<f64> {
        self.find_clade(taxa).and_then(|i| self.nodes[i].length)
    }

    /// Convert to a `phylotree` tree (for Newick output or further analysis).
    pub fn to_phylotree(&self) -> Result<PhyloTree> {
        let mut tree = PhyloTree::new();
        let mut ids: HashMap<NodeIndex, usize> = HashMap::with_capacity(self.nodes.len());

        for index in self.preorder() {
            let node = &self.nodes[index];
            let phylo_node = match &node.name {
                Some(name) => PhyloNode::new_named(name),
                None => PhyloNode::new(),
            };
            let id = match node.parent {
                None => tree.add(phylo_node),
                Some(parent) => tree.add_child(phylo_node, ids[&parent], node.length)?,
            };
            ids.insert(index, id);
        }

        Ok(tree)
    }

    /// Newick text of this tree.
    pub fn to_newick(&self) -> Result<String> {
        Ok(self.to_phylotree()?.to_newick()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ```text
    ///        root
    ///       /    \
    ///      A     (1)
    ///           /   \
    ///          B     C
    /// ```
    fn sample() -> ConsensusTree {
        let mut tree = ConsensusTree::with_root(None, None);
        tree.add_child(0, None, Some("A".into()), Some(1.0));
        let inner = tree.add_child(0, None, None, Some(0.5));
        tree.add_child(inner, None, Some("B".into()), Some(2.0));
        tree.add_child(inner, None, Some("C".into()), Some(3.0));
        tree
    }

    #[test]
    fn test_traversals() {
        let tree = sample();
        assert_eq!(tree.preorder(), vec![0, 1, 2, 3, 4]);
        assert_eq!(tree.postorder(), vec![1, 3, 4, 2, 0]);
        assert_eq!(tree.levelorder(), vec![0, 1, 2, 3, 4]);
        assert_eq!(tree.leaves(), vec![1, 3, 4]);
        assert_eq!(tree.leaf_names(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_clade_queries() {
        let tree = sample();
        let clades = tree.clades();
        assert_eq!(clades.len(), 1);
        assert!(clades.contains(&vec!["B".to_string(), "C".to_string()]));

        assert_eq!(tree.find_clade(&["C", "B"]), Some(2));
        assert_eq!(tree.length_of_clade(&["B", "C"]), Some(0.5));
        assert_eq!(tree.length_of_clade(&["A"]), Some(1.0));
        assert_eq!(tree.length_of_clade(&["A", "B"]), None);
    }

    #[test]
    fn test_newick_round_trip() {
        let newick = sample().to_newick().unwrap();
        let parsed = PhyloTree::from_newick(&newick).unwrap();

        let mut names: Vec<String> = parsed
            .get_leaves()
            .iter()
            .filter_map(|id| parsed.get(id).ok()?.name.clone())
            .collect();
        names.sort();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(parsed.get_leaves().len(), 3);
    }
}
