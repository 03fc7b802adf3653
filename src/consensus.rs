//! PrimConsTree: one consensus tree from a batch of rooted trees.
//!
//! # Pipeline
//! ```text
//! input trees ─► SuperGraph (clade registry + aggregation)
//!             ─► modified Prim (parent of every clade)
//!             ─► reconstruct (raw tree labelled by clade id)
//!             ─► simplify (degenerate nodes removed, taxa named)
//! ```
//! Every call owns its registry and super-graph; nothing is shared between
//! calls, so independent batches can be computed in parallel.

use crate::error::{ConsensusError, Result};
use crate::prim::{MstCriteria, modified_prim};
use crate::reconstruct::reconstruct;
use crate::simplify::{MergePolicy, simplify};
use crate::supergraph::{BatchSnapshot, SuperGraph};
use crate::tree::ConsensusTree;
use phylotree::tree::Tree as PhyloTree;
use rayon::prelude::*;
use tracing::debug;

/// Knobs of one consensus computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsensusConfig {
    /// Criteria ranking super-graph edges
    pub criteria: MstCriteria,

    /// How collapsed branch lengths combine
    pub merge: MergePolicy,
}

impl ConsensusConfig {
    pub fn new(legacy_mst: bool, average_on_merge: bool) -> Self {
        ConsensusConfig {
            criteria: if legacy_mst { MstCriteria::Legacy } else { MstCriteria::Extended },
            merge: if average_on_merge { MergePolicy::Average } else { MergePolicy::Sum },
        }
    }
}

/// Build the consensus tree of `trees`.
///
/// # Errors
/// - `EmptyInput` if `trees` is empty
/// - taxon errors if the trees do not share one taxon set
/// - `DisconnectedGraph` if the spanning tree cannot cover every clade
pub fn build_consensus(trees: &[PhyloTree], config: &ConsensusConfig) -> Result<ConsensusTree> {
    consensus_of_batch(BatchSnapshot::from_trees(trees)?, config)
}

fn consensus_of_batch(batch: BatchSnapshot, config: &ConsensusConfig) -> Result<ConsensusTree> {
    debug!(trees = batch.len(), ?config, "building consensus");

    let graph = SuperGraph::from_snapshots(batch);
    let spanning = modified_prim(&graph, config.criteria)?;
    let raw = reconstruct(&spanning, &graph);
    let consensus = simplify(&raw, graph.registry(), config.merge)?;

    debug!(nodes = consensus.len(), "consensus built");
    Ok(consensus)
}

/// Parse Newick strings, then build their consensus.
pub fn build_consensus_from_newick<S: AsRef<str>>(
    newicks: &[S],
    config: &ConsensusConfig,
) -> Result<ConsensusTree> {
    let trees = newicks
        .iter()
        .enumerate()
        .map(|(index, newick)| {
            PhyloTree::from_newick(newick.as_ref()).map_err(|e| ConsensusError::Parse {
                index,
                message: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    build_consensus(&trees, config)
}

/// One consensus per consecutive batch of `batch_size` trees (the last batch
/// may be shorter), computed in parallel. Results keep the batch order.
///
/// Batches are snapshotted sequentially first: phylotree trees are not
/// `Sync`, their snapshots are.
pub fn build_consensus_batches(
    trees: &[PhyloTree],
    batch_size: usize,
    config: &ConsensusConfig,
) -> Result<Vec<ConsensusTree>> {
    if batch_size == 0 || trees.is_empty() {
        return Err(ConsensusError::EmptyInput);
    }
    let batches = trees
        .chunks(batch_size)
        .map(BatchSnapshot::from_trees)
        .collect::<Result<Vec<_>>>()?;
    batches
        .into_par_iter()
        .map(|batch| consensus_of_batch(batch, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use std::collections::BTreeSet;

    fn parse(newicks: &[&str]) -> Vec<PhyloTree> {
        newicks
            .iter()
            .map(|n| PhyloTree::from_newick(n).unwrap())
            .collect()
    }

    fn clade(taxa: &[&str]) -> Vec<String> {
        let mut v: Vec<String> = taxa.iter().map(|t| t.to_string()).collect();
        v.sort();
        v
    }

    fn sorted_leaves(tree: &ConsensusTree) -> Vec<String> {
        tree.leaf_names().into_iter().sorted().collect()
    }

    /// Every non-root clade (leaves included) with the length above it.
    fn clade_lengths(tree: &ConsensusTree) -> Vec<(Vec<String>, f64)> {
        tree.clades()
            .into_iter()
            .chain(tree.leaf_names().into_iter().map(|name| vec![name]))
            .map(|taxa| {
                let refs: Vec<&str> = taxa.iter().map(String::as_str).collect();
                let length = tree.length_of_clade(&refs).unwrap();
                (taxa, length)
            })
            .sorted_by(|a, b| a.0.cmp(&b.0))
            .collect()
    }

    const FIVE_TAXA: [&str; 4] = [
        "((A:0.1,B:0.2):0.3,(C:0.4,(D:0.5,E:0.6):0.7):0.8);",
        "((A:0.2,B:0.2):0.1,((C:0.3,D:0.5):0.2,E:0.6):0.4);",
        "(((A:0.1,B:0.1):0.3,C:0.4):0.5,(D:0.5,E:0.1):0.9);",
        "((A:0.3,B:0.2):0.2,(C:0.2,(D:0.1,E:0.6):0.5):0.3);",
    ];

    #[test]
    fn test_three_taxa_scenario() {
        let consensus = build_consensus_from_newick(
            &["(A:1,(B:1,C:1):1);", "(A:1,(B:1,C:1):1);", "((A:1,B:1):1,C:1);"],
            &ConsensusConfig::default(),
        )
        .unwrap();

        assert_eq!(consensus.clades(), BTreeSet::from([clade(&["B", "C"])]));
        assert_eq!(consensus.length_of_clade(&["B", "C"]), Some(1.0));
        assert_eq!(consensus.node(consensus.root()).children.len(), 2);
        assert_eq!(consensus.leaf_names(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_repeated_tree_is_reproduced() {
        let newick = "((A:0.1,B:0.2):0.3,(C:0.4,(D:0.5,E:0.6):0.7):0.8);";

        for copies in [1, 2, 5] {
            for config in [ConsensusConfig::new(false, false), ConsensusConfig::new(true, false)] {
                let trees = parse(&vec![newick; copies]);
                let consensus = build_consensus(&trees, &config).unwrap();

                assert_eq!(
                    consensus.clades(),
                    BTreeSet::from([
                        clade(&["A", "B"]),
                        clade(&["C", "D", "E"]),
                        clade(&["D", "E"]),
                    ])
                );
                let expected = [
                    (vec!["A"], 0.1),
                    (vec!["B"], 0.2),
                    (vec!["A", "B"], 0.3),
                    (vec!["C"], 0.4),
                    (vec!["D"], 0.5),
                    (vec!["E"], 0.6),
                    (vec!["D", "E"], 0.7),
                    (vec!["C", "D", "E"], 0.8),
                ];
                for (taxa, length) in expected {
                    let got = consensus.length_of_clade(&taxa).unwrap();
                    assert!((got - length).abs() < 1e-12, "{taxa:?}: {got} != {length}");
                }
            }
        }
    }

    #[test]
    fn test_leaf_set_is_preserved() {
        for config in [
            ConsensusConfig::new(false, false),
            ConsensusConfig::new(true, true),
        ] {
            let consensus = build_consensus(&parse(&FIVE_TAXA), &config).unwrap();
            assert_eq!(sorted_leaves(&consensus), vec!["A", "B", "C", "D", "E"]);
        }
    }

    #[test]
    fn test_clades_shared_by_all_trees_survive() {
        // {A,B} is in every input tree
        let consensus = build_consensus(&parse(&FIVE_TAXA), &ConsensusConfig::default()).unwrap();
        assert!(consensus.clades().contains(&clade(&["A", "B"])));
    }

    #[test]
    fn test_input_order_does_not_change_result() {
        let reference = build_consensus(&parse(&FIVE_TAXA), &ConsensusConfig::default()).unwrap();

        for perm in FIVE_TAXA.iter().copied().permutations(FIVE_TAXA.len()) {
            let consensus = build_consensus(&parse(&perm), &ConsensusConfig::default()).unwrap();
            assert_eq!(consensus.clades(), reference.clades());
            assert_eq!(sorted_leaves(&consensus), sorted_leaves(&reference));

            let got = clade_lengths(&consensus);
            let want = clade_lengths(&reference);
            assert_eq!(got.len(), want.len());
            for ((taxa, l1), (expected_taxa, l2)) in got.iter().zip(&want) {
                assert_eq!(taxa, expected_taxa);
                assert!((l1 - l2).abs() < 1e-12, "{taxa:?}: {l1} != {l2}");
            }
        }
    }

    #[test]
    fn test_merge_policy_on_collapsed_clade() {
        // {C,D,E} attaches below {D,E} and keeps only C as a child, so it
        // collapses and C's branch absorbs its length
        let newicks = [
            "((A:1,B:1):1,(C:1,(D:1,E:1):1):1);",
            "(((A:1,B:1):1,C:1):1,(D:1,E:1):1);",
        ];

        for (config, c_length) in [
            (ConsensusConfig::new(false, false), 2.0),
            (ConsensusConfig::new(false, true), 1.0),
        ] {
            let consensus = build_consensus_from_newick(&newicks, &config).unwrap();
            assert_eq!(
                consensus.clades(),
                BTreeSet::from([clade(&["A", "B"]), clade(&["C", "D", "E"])])
            );
            assert_eq!(consensus.node(consensus.root()).children.len(), 2);
            let cde = consensus.find_clade(&["C", "D", "E"]).unwrap();
            assert_eq!(consensus.node(cde).children.len(), 3);

            assert_eq!(consensus.length_of_clade(&["C"]), Some(c_length));
            assert_eq!(consensus.length_of_clade(&["C", "D", "E"]), Some(1.0));
            assert_eq!(consensus.length_of_clade(&["A", "B"]), Some(1.0));
            assert_eq!(consensus.length_of_clade(&["D"]), Some(1.0));
        }
    }

    #[test]
    fn test_unsupported_clade_is_pruned() {
        // {A,B,C} is attached by the spanning tree but keeps no child
        let consensus = build_consensus_from_newick(
            &["((A:1,B:1):1,(C:1,D:1):1);", "(((A:1,B:1):1,C:1):1,D:1);"],
            &ConsensusConfig::default(),
        )
        .unwrap();
        assert_eq!(
            consensus.clades(),
            BTreeSet::from([clade(&["A", "B"]), clade(&["C", "D"])])
        );
        assert_eq!(consensus.len(), 7);
    }

    #[test]
    fn test_batches_keep_order() {
        let mut newicks = vec!["(A:1,(B:1,C:1):1);"; 3];
        newicks.extend(vec!["((A:1,B:1):1,C:1);"; 3]);
        let trees = parse(&newicks);

        let batches = build_consensus_batches(&trees, 3, &ConsensusConfig::default()).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].clades(), BTreeSet::from([clade(&["B", "C"])]));
        assert_eq!(batches[1].clades(), BTreeSet::from([clade(&["A", "B"])]));

        let uneven = build_consensus_batches(&trees, 4, &ConsensusConfig::default()).unwrap();
        assert_eq!(uneven.len(), 2);
    }

    #[test]
    fn test_errors() {
        let config = ConsensusConfig::default();
        assert!(matches!(build_consensus(&[], &config), Err(ConsensusError::EmptyInput)));
        assert!(matches!(
            build_consensus_batches(&parse(&["(A:1,B:1);"]), 0, &config),
            Err(ConsensusError::EmptyInput)
        ));
        assert!(matches!(
            build_consensus_from_newick(&["(A:1,B:1);", "(A:1,C:1);"], &config),
            Err(ConsensusError::TaxonMismatch { tree: 1, .. })
        ));
        assert!(matches!(
            build_consensus_from_newick(&["(A:1,B:1);", "(A:1,B:x);"], &config),
            Err(ConsensusError::Parse { index: 1, .. })
        ));
    }
}
