use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use phylotree::tree::Tree;
use tracing::warn;

use crate::error::{ConsensusError, Result};
use crate::tree::ConsensusTree;

/// Strip BEAST annotations from Newick strings.
///
/// BEAST format includes annotations like :[&rate=0.123]2.45 where 2.45 is the actual branch length.
/// This function removes the [&...] annotations while preserving the branch lengths.
fn strip_beast_annotations(newick: &str) -> String {
    let mut result = String::with_capacity(newick.len());
    let mut in_annotation = false;
    let mut chars = newick.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '[' && chars.peek() == Some(&'&') {
            in_annotation = true;
        } else if ch == ']' && in_annotation {
            in_annotation = false;
        } else if !in_annotation {
            result.push(ch);
        }
    }

    result
}

fn is_gz(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".gz")
}

/// Read a whole text file, decompressing it if the name ends with `.gz`.
fn read_text(path: &Path) -> io::Result<String> {
    let mut content = String::new();
    if is_gz(path) {
        GzDecoder::new(File::open(path)?).read_to_string(&mut content)?;
    } else {
        content = fs::read_to_string(path)?;
    }
    Ok(content)
}

fn is_nexus(content: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .is_some_and(|line| line.to_ascii_uppercase().starts_with("#NEXUS"))
}

/// Read input trees for a consensus run.
///
/// Two layouts are accepted:
/// - plain Newick, one tree per non-empty line
/// - NEXUS/BEAST `.trees` files (`TREE name = ...` lines, optional
///   `TRANSLATE` block applied when `use_real_taxa` is set)
///
/// The first `burnin_trees` trees are dropped.
pub fn read_trees<P: AsRef<Path>>(
    path: P,
    burnin_trees: usize,
    use_real_taxa: bool,
) -> Result<Vec<Tree>> {
    let content = read_text(path.as_ref())?;

    let newicks: Vec<String> = if is_nexus(&content) {
        collect_tree_blocks(&content)
            .into_iter()
            .map(|tree| strip_beast_annotations(&tree.body))
            .collect()
    } else {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    };

    let translate = if use_real_taxa {
        parse_taxon_block(&content)
    } else {
        HashMap::new()
    };

    newicks
        .iter()
        .enumerate()
        .skip(burnin_trees)
        .map(|(index, newick)| {
            let mut tree = Tree::from_newick(newick).map_err(|e| ConsensusError::Parse {
                index,
                message: e.to_string(),
            })?;
            if !translate.is_empty() {
                rename_leaf_nodes(&mut tree, &translate);
            }
            Ok(tree)
        })
        .collect()
}

struct TreeBlock { body: String }

fn collect_tree_blocks(content: &str) -> Vec<TreeBlock> {
    content
        .lines()
        .skip_while(|line| !line.trim().to_ascii_uppercase().starts_with("TREE "))
        .take_while(|line| !line.trim().to_ascii_uppercase().starts_with("END;"))
        .filter_map(|line| {
            let mut parts = line.splitn(2, " = ");
            let _header = parts.next()?;
            let body = parts.next()?.trim().to_string();
            Some(TreeBlock { body })
        })
        .collect()
}

fn parse_taxon_block(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .skip_while(|line| !line.trim().to_ascii_uppercase().starts_with("TRANSLATE"))
        .skip(1)
        .take_while(|line| !line.trim().to_ascii_uppercase().starts_with(";"))
        // STRUCTURE:
        // 1 '1959.M.CD.59.ZR59',
        // 2 '1960.DRC60A',
        .filter_map(|line| {
            let line = line.trim().trim_end_matches(',').trim_end_matches(';');
            let mut parts = line.split_whitespace();
            let id = parts.next()?.to_string();
            let label = parts.next()?.trim_matches('\'').to_string();
            Some((id, label))
        })
        .collect::<HashMap<_, _>>()
}

/// Replace leaf names found in `translate`; other names are left untouched.
pub fn rename_leaf_nodes(phylo_tree: &mut Tree, translate: &HashMap<String, String>) {
    for leaf_id in phylo_tree.get_leaves() {
        if let Ok(node) = phylo_tree.get_mut(&leaf_id) {
            if let Some(label) = node.name.as_ref().and_then(|n| translate.get(n)) {
                node.name = Some(label.clone());
            }
        }
    }
}

/// First free path among `path`, `stem_1.ext`, `stem_2.ext`, ...
/// Parent directories are created on the way.
pub fn unique_output_path(path: &Path) -> io::Result<PathBuf> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let file_name = path.file_name().and_then(|s| s.to_str()).unwrap_or("consensus");
    let (stem, extension) = match file_name.split_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (file_name, String::new()),
    };

    let mut counter = 1;
    loop {
        let candidate = path.with_file_name(format!("{stem}_{counter}{extension}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
        counter += 1;
    }
}

fn write_lines<W: Write>(out: &mut W, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// Write consensus trees as Newick, one per line.
///
/// If `path` equals `-`, trees go to stdout. If it ends with `.gz`, the
/// output is gzip-compressed. An existing file is never overwritten: the
/// trees go to the next free `name_N.ext` instead. Returns the path used.
pub fn write_trees<P: AsRef<Path>>(path: P, trees: &[ConsensusTree]) -> Result<PathBuf> {
    let requested = path.as_ref();

    let lines = trees
        .iter()
        .map(ConsensusTree::to_newick)
        .collect::<Result<Vec<_>>>()?;

    if requested.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        write_lines(&mut out, &lines)?;
        out.flush()?;
        return Ok(requested.to_path_buf());
    }

    let target = unique_output_path(requested)?;
    if target != requested {
        warn!("File {} already exists, writing to {}", requested.display(), target.display());
    }

    let file = File::create(&target)?;
    if is_gz(&target) {
        let mut out = BufWriter::new(GzEncoder::new(file, Compression::default()));
        write_lines(&mut out, &lines)?;
        // finish() writes the gzip trailer
        out.into_inner()
            .map_err(io::IntoInnerError::into_error)?
            .finish()?;
    } else {
        let mut out = BufWriter::new(file);
        write_lines(&mut out, &lines)?;
        out.flush()?;
    }

    Ok(target)
}
