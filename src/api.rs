//! Python binding layer for consensus construction.
//!
//! Provides Python functions building PrimConsTree consensus trees from
//! Newick strings or tree files.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::consensus::{ConsensusConfig, build_consensus_batches, build_consensus_from_newick};
use crate::error::ConsensusError;
use crate::io::read_trees;

fn to_py_err(e: ConsensusError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Build the consensus of a list of Newick strings.
///
/// Args:
///     newicks: Newick strings of rooted trees on the same taxa
///     legacy_mst: Rank edges by frequency and candidate degree only (default: False)
///     average_on_merge: Average collapsed branch lengths instead of summing (default: False)
///
/// Returns:
///     The consensus tree as a Newick string
///
/// Raises:
///     ValueError: If no trees are given, a tree cannot be parsed, or taxa differ
#[pyfunction]
#[pyo3(signature = (newicks, legacy_mst=false, average_on_merge=false))]
fn primconstree(newicks: Vec<String>, legacy_mst: bool, average_on_merge: bool) -> PyResult<String> {
    let config = ConsensusConfig::new(legacy_mst, average_on_merge);
    build_consensus_from_newick(&newicks, &config)
        .and_then(|tree| tree.to_newick())
        .map_err(to_py_err)
}

/// Build consensus trees from a Newick or NEXUS/BEAST tree file.
///
/// Args:
///     path: Path to the tree file (optionally gzip-compressed)
///     batch_size: Trees per consensus; 0 uses all trees in one batch (default: 0)
///     burnin_trees: Number of trees to skip at the beginning of the file (default: 0)
///     use_real_taxa: Use TRANSLATE block for taxon names when available (default: True)
///     legacy_mst: Rank edges by frequency and candidate degree only (default: False)
///     average_on_merge: Average collapsed branch lengths instead of summing (default: False)
///
/// Returns:
///     One Newick string per batch, in batch order
#[pyfunction]
#[pyo3(signature = (path, batch_size=0, burnin_trees=0, use_real_taxa=true, legacy_mst=false, average_on_merge=false))]
fn primconstree_file(
    path: String,
    batch_size: usize,
    burnin_trees: usize,
    use_real_taxa: bool,
    legacy_mst: bool,
    average_on_merge: bool,
) -> PyResult<Vec<String>> {
    let trees = read_trees(&path, burnin_trees, use_real_taxa).map_err(to_py_err)?;
    if trees.is_empty() {
        return Err(PyValueError::new_err(format!(
            "No trees found in file '{}' after burnin removal",
            path
        )));
    }

    let batch_size = if batch_size == 0 { trees.len() } else { batch_size };
    let config = ConsensusConfig::new(legacy_mst, average_on_merge);
    build_consensus_batches(&trees, batch_size, &config)
        .and_then(|batches| batches.iter().map(|t| t.to_newick()).collect())
        .map_err(to_py_err)
}

/// Python module definition
#[pymodule]
#[pyo3(name = "primconstree")]
fn primconstree_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(primconstree, m)?)?;
    m.add_function(wrap_pyfunction!(primconstree_file, m)?)?;
    Ok(())
}
