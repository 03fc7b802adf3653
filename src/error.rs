//! Error taxonomy for consensus construction.
//!
//! Every failure is a structural precondition or invariant violation.
//! The computation is deterministic, so none of them is worth retrying
//! without changing the input.

use phylotree::tree::TreeError;
use thiserror::Error;

use crate::registry::CladeId;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("Need at least one tree to build a consensus")]
    EmptyInput,

    #[error("Need at least 2 taxa to build a consensus, found {found}")]
    TooFewTaxa { found: usize },

    #[error("Tree {tree} has a leaf without a taxon name")]
    UnnamedLeaf { tree: usize },

    #[error("Tree {tree} contains taxon '{taxon}' more than once")]
    DuplicateTaxon { tree: usize, taxon: String },

    #[error("Tree {tree} does not share the taxon set of tree 0: {reason}")]
    TaxonMismatch { tree: usize, reason: String },

    #[error("Clade {clade} is unreachable from the root through internal clades")]
    DisconnectedGraph { clade: CladeId },

    #[error("Failed to parse tree at index {index}: {message}")]
    Parse { index: usize, message: String },

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
