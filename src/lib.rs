//! Crate root: lightweight module orchestration and public re-exports.
//!
//! Modules, leaf-first:
//! - `bitset`: compact bitset keys for clades.
//! - `registry`: stable integer identities for clades.
//! - `snapshot`: pre-order clade view of one input tree.
//! - `supergraph`: aggregation of all input trees into one weighted clade graph.
//! - `prim`: modified Prim spanning arborescence over the super-graph.
//! - `tree`: arena tree used for reconstructed and consensus trees.
//! - `reconstruct`: spanning structure back to a rooted tree.
//! - `simplify`: collapse of degenerate nodes, taxon naming.
//! - `consensus`: the PrimConsTree entry points.
//! - `io`: reading input tree files, writing consensus trees.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod bitset;
pub mod consensus;
pub mod error;
pub mod io;
pub mod prim;
pub mod reconstruct;
pub mod registry;
pub mod simplify;
pub mod snapshot;
pub mod supergraph;
pub mod tree;

#[cfg(feature = "python")]
pub mod api;

// Re-export frequently used types & functions
pub use bitset::Bitset;
pub use consensus::{ConsensusConfig, build_consensus, build_consensus_batches, build_consensus_from_newick};
pub use error::{ConsensusError, Result};
pub use io::{read_trees, write_trees};
pub use prim::MstCriteria;
pub use registry::{CladeId, CladeRegistry};
pub use simplify::MergePolicy;
pub use supergraph::SuperGraph;
pub use tree::ConsensusTree;
