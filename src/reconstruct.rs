//! Turn the spanning structure back into a rooted tree.

use crate::prim::SpanningTree;
use crate::supergraph::SuperGraph;
use crate::tree::ConsensusTree;
use std::collections::VecDeque;

/// Breadth-first walk from the root along the spanning tree's child
/// relations. Every node is labelled with its clade id; every edge gets the
/// super-graph's average length for that clade pair.
pub fn reconstruct(spanning: &SpanningTree, graph: &SuperGraph) -> ConsensusTree {
    let children = spanning.children();
    let root = spanning.root();

    let mut tree = ConsensusTree::with_root(Some(root), None);
    let mut queue = VecDeque::from([(root, tree.root())]);

    while let Some((clade, index)) = queue.pop_front() {
        for &child in &children[clade] {
            let length = graph.edge(clade, child).map(|e| e.avg_length);
            let child_index = tree.add_child(index, Some(child), None, length);
            queue.push_back((child, child_index));
        }
    }

    tree
}
