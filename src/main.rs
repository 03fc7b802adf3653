use clap::Parser;
use primconstree::consensus::{ConsensusConfig, build_consensus_batches};
use primconstree::io::{read_trees, write_trees};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{Level, error, info};

/// Build PrimConsTree consensus trees from a set of rooted trees on the same
/// taxa and write them as Newick, one consensus per line.
#[derive(Parser, Debug)]
#[command(name = "primconstree", version, about = "PrimConsTree consensus of rooted phylogenetic trees")]
struct Args {
    /// Input trees: Newick (one per line) or NEXUS/BEAST .trees, optionally .gz
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output path for the consensus Newick ("-" for stdout, .gz to compress)
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: PathBuf,

    /// Rank edges by frequency and candidate degree only (previous criteria)
    #[arg(long = "legacy-mst", default_value_t = false)]
    legacy_mst: bool,

    /// Average branch lengths when collapsing unary nodes instead of summing them
    #[arg(long = "average-on-merge", default_value_t = false)]
    average_on_merge: bool,

    /// Build one consensus per batch of K consecutive trees (0: one batch with all trees)
    #[arg(short = 'k', long = "batch-size", default_value_t = 0)]
    batch_size: usize,

    /// Burn-in by number of trees (drop first N trees)
    #[arg(short = 't', long = "burnin-trees", default_value_t = 0)]
    burnin_trees: usize,

    /// Use TRANSLATE block to map taxon IDs to labels when available
    #[arg(long = "use-real-taxa", default_value_t = false)]
    use_real_taxa: bool,

    /// Quiet mode: only warnings and errors on stderr
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,

    /// Verbose mode: also log every pipeline stage
    #[arg(short = 'v', long = "verbose", default_value_t = false, conflicts_with = "quiet")]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.quiet {
        Level::WARN
    } else if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let t0 = Instant::now();
    let trees = match read_trees(&args.input, args.burnin_trees, args.use_real_taxa) {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to read {:?}: {e}", args.input);
            std::process::exit(2);
        }
    };
    if trees.is_empty() {
        error!("No trees parsed from {:?}.", args.input);
        std::process::exit(2);
    }
    info!("Reading input {:.3}s", t0.elapsed().as_secs_f64());
    info!("Read in {} trees", trees.len());

    let config = ConsensusConfig::new(args.legacy_mst, args.average_on_merge);
    let batch_size = if args.batch_size == 0 { trees.len() } else { args.batch_size };

    let t1 = Instant::now();
    info!(
        "Building {} consensus tree(s) from batches of {batch_size}",
        trees.len().div_ceil(batch_size)
    );
    let consensus = match build_consensus_batches(&trees, batch_size, &config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to build consensus: {e}");
            std::process::exit(3);
        }
    };
    info!("Building consensus {:.3}s", t1.elapsed().as_secs_f64());

    let t2 = Instant::now();
    match write_trees(&args.output, &consensus) {
        Ok(path) if path.as_os_str() == "-" => {
            info!("Writing to stdout {:.3}s", t2.elapsed().as_secs_f64());
        }
        Ok(path) => {
            info!("Writing to {} {:.3}s", path.display(), t2.elapsed().as_secs_f64());
        }
        Err(e) => {
            error!("Failed to write output {:?}: {e}", args.output);
            std::process::exit(4);
        }
    }
}
