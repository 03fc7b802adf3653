//! Collapse degenerate nodes of a reconstructed tree and restore taxon names.
//!
//! Clade merging leaves two kinds of internal nodes without topological
//! meaning:
//! - internal clades whose leaves all attached elsewhere (no child left):
//!   dropped together with their branch
//! - internal clades with a single child: removed, the child hangs from the
//!   former grandparent, and the removed branch length is merged into the
//!   child's
//!
//! A single post-order pass decides the fate of every node and records the
//! merged segments per surviving node. Lengths are finalized only after the
//! pass, so a chain of unary ancestors contributes every segment.

use crate::error::{ConsensusError, Result};
use crate::registry::CladeRegistry;
use crate::tree::{ConsensusTree, NodeIndex};
use tracing::debug;

/// How merged branch segments combine with the surviving node's own length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    #[default]
    Sum,
    Average,
}

impl MergePolicy {
    fn combine(self, own: f64, merged: &[f64]) -> f64 {
        let total = own + merged.iter().sum::<f64>();
        match self {
            MergePolicy::Sum => total,
            MergePolicy::Average => total / (merged.len() + 1) as f64,
        }
    }
}

/// A surviving node, before lengths are finalized.
#[derive(Debug)]
struct Draft {
    source: NodeIndex,
    children: Vec<usize>,
    own: Option<f64>,
    merged: Vec<f64>,
}

/// Simplify `raw` (nodes labelled by clade id) into the final consensus
/// tree, naming leaves after their taxa.
///
/// # Errors
/// `DisconnectedGraph` if nothing survives, which only happens when the
/// raw tree carries no leaf clade at all.
pub fn simplify(raw: &ConsensusTree, registry: &CladeRegistry, policy: MergePolicy) -> Result<ConsensusTree> {
    let is_taxon = |index: NodeIndex| raw.node(index).clade.is_some_and(|c| registry.is_leaf(c));

    let mut drafts: Vec<Draft> = Vec::with_capacity(raw.len());
    // raw node → surviving draft standing in its place
    let mut survivor: Vec<Option<usize>> = vec![None; raw.len()];
    let (mut dropped, mut collapsed) = (0usize, 0usize);

    for index in raw.postorder() {
        let node = raw.node(index);
        if is_taxon(index) {
            survivor[index] = Some(drafts.len());
            drafts.push(Draft {
                source: index,
                children: Vec::new(),
                own: node.length,
                merged: Vec::new(),
            });
            continue;
        }

        let kept: Vec<usize> = node.children.iter().filter_map(|&c| survivor[c]).collect();
        match kept.len() {
            0 => dropped += 1,
            1 => {
                let only = kept[0];
                collapsed += 1;
                match node.length {
                    Some(length) => drafts[only].merged.push(length),
                    None => {
                        // Unary root: the child becomes the root
                        drafts[only].own = None;
                        drafts[only].merged.clear();
                    }
                }
                survivor[index] = Some(only);
            }
            _ => {
                survivor[index] = Some(drafts.len());
                drafts.push(Draft {
                    source: index,
                    children: kept,
                    own: node.length,
                    merged: Vec::new(),
                });
            }
        }
    }

    let root = survivor[raw.root()].ok_or(ConsensusError::DisconnectedGraph {
        clade: raw.node(raw.root()).clade.unwrap_or(registry.root()),
    })?;
    debug!(dropped, collapsed, ?policy, "degenerate nodes removed");

    let finalize = |draft: &Draft| -> Option<f64> {
        let own = draft.own?;
        if draft.merged.is_empty() {
            Some(own)
        } else {
            Some(policy.combine(own, &draft.merged))
        }
    };
    let name_of = |draft: &Draft| {
        raw.node(draft.source)
            .clade
            .and_then(|c| registry.taxon(c))
            .map(str::to_string)
    };

    let root_draft = &drafts[root];
    let mut tree = ConsensusTree::with_root(raw.node(root_draft.source).clade, name_of(root_draft));
    let mut stack: Vec<(usize, NodeIndex)> = vec![(root, tree.root())];
    while let Some((draft_index, tree_index)) = stack.pop() {
        for &child in &drafts[draft_index].children {
            let draft = &drafts[child];
            let child_index = tree.add_child(
                tree_index,
                raw.node(draft.source).clade,
                name_of(draft),
                finalize(draft),
            );
            stack.push((child, child_index));
        }
    }

    Ok(tree)
}
