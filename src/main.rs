// Clippy allows
#![allow(clippy::too_many_arguments)]

//! BGAT: BedGraph Aggregation Toolkit
//!
//! Usage: bgat <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use bgat::aggregate::{AverageProfile, GeneProfile, HeatProfile, TssProfile, VProfile};
use bgat::coverage::coverage;
use bgat::error::Result;
use bgat::io::{read_bed_path, read_bedgraph_path, read_refseq_path, write_bedgraph};
use bgat::parallel::{init_thread_pool, ChromStats};
use bgat::regions::Regions;
use bgat::BedGraph;
use rustc_hash::FxHashMap;

#[derive(Parser)]
#[command(name = "bgat")]
#[command(version)]
#[command(about = "BGAT: BedGraph Aggregation Toolkit - coverage-track profiles over genomic regions", long_about = None)]
struct Cli {
    /// Number of threads to use (default: number of CPUs)
    #[arg(long, short = 't', global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Average profile in a fixed window around each region's 5' anchor
    Tss {
        /// Input BEDGRAPH file
        bedgraph: PathBuf,

        /// Regions BED file (anchors are strand-aware)
        regions: PathBuf,

        /// Output width in columns
        #[arg(short, long, default_value = "2000")]
        width: usize,

        /// Genomic window size around each anchor
        #[arg(short = 'r', long, default_value = "2000")]
        region_size: i64,

        /// Skip per-million-coverage normalization
        #[arg(long)]
        no_normalize: bool,

        /// Output TSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print region statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Average profile over whole regions rescaled to a common width
    Average {
        /// Input BEDGRAPH file
        bedgraph: PathBuf,

        /// Regions BED file
        regions: PathBuf,

        /// Output width in columns
        #[arg(short, long, default_value = "2000")]
        width: usize,

        /// Skip per-million-coverage normalization
        #[arg(long)]
        no_normalize: bool,

        /// Output TSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print region statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Heat matrix around region midpoints, rows ranked by region size
    Heat {
        /// Input BEDGRAPH file
        bedgraph: PathBuf,

        /// Regions BED file
        regions: PathBuf,

        /// Output width in columns
        #[arg(short, long, default_value = "2000")]
        width: usize,

        /// Genomic window size around each midpoint
        #[arg(short = 'r', long, default_value = "100000")]
        region_size: i64,

        /// Matrix height as a fraction of the width
        #[arg(long, default_value = "2.0")]
        aspect_ratio: f64,

        /// Skip per-million-coverage normalization
        #[arg(long)]
        no_normalize: bool,

        /// Output TSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print region statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// V-plot: rows proportional to region size, windows around midpoints
    Vplot {
        /// Input BEDGRAPH file
        bedgraph: PathBuf,

        /// Regions BED file
        regions: PathBuf,

        /// Output width in columns
        #[arg(short, long, default_value = "2000")]
        width: usize,

        /// Genomic window size around each midpoint
        #[arg(short = 'r', long, default_value = "50000")]
        region_size: i64,

        /// Matrix height as a fraction of the width
        #[arg(long, default_value = "1.0")]
        aspect_ratio: f64,

        /// Skip per-million-coverage normalization
        #[arg(long)]
        no_normalize: bool,

        /// Output TSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print region statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Meta-gene profile with aligned 5'UTR / CDS / 3'UTR panels
    Gene {
        /// Input BEDGRAPH file
        bedgraph: PathBuf,

        /// RefSeq-style gene table
        refseq: PathBuf,

        /// Output width in columns
        #[arg(short, long, default_value = "2000")]
        width: usize,

        /// Skip per-million-coverage normalization
        #[arg(long)]
        no_normalize: bool,

        /// Output TSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Interval pileup: depth-of-coverage BEDGRAPH from a BED file
    Coverage {
        /// Input BED file
        regions: PathBuf,

        /// Output BEDGRAPH file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Some(n) = cli.threads {
        if let Err(e) = init_thread_pool(n) {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }

    let result = match cli.command {
        Commands::Tss {
            bedgraph,
            regions,
            width,
            region_size,
            no_normalize,
            output,
            stats,
        } => run_tss(bedgraph, regions, width, region_size, no_normalize, output, stats),

        Commands::Average {
            bedgraph,
            regions,
            width,
            no_normalize,
            output,
            stats,
        } => run_average(bedgraph, regions, width, no_normalize, output, stats),

        Commands::Heat {
            bedgraph,
            regions,
            width,
            region_size,
            aspect_ratio,
            no_normalize,
            output,
            stats,
        } => run_heat(
            bedgraph,
            regions,
            width,
            region_size,
            aspect_ratio,
            no_normalize,
            output,
            stats,
        ),

        Commands::Vplot {
            bedgraph,
            regions,
            width,
            region_size,
            aspect_ratio,
            no_normalize,
            output,
            stats,
        } => run_vplot(
            bedgraph,
            regions,
            width,
            region_size,
            aspect_ratio,
            no_normalize,
            output,
            stats,
        ),

        Commands::Gene {
            bedgraph,
            refseq,
            width,
            no_normalize,
            output,
        } => run_gene(bedgraph, refseq, width, no_normalize, output),

        Commands::Coverage { regions, output } => run_coverage(regions, output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn open_output(path: Option<PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => Box::new(BufWriter::new(File::create(p)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn print_stats(regions: &FxHashMap<String, Regions>) {
    let stats = ChromStats::from_regions(regions);
    eprintln!(
        "{} regions across {} chromosomes",
        stats.total_regions, stats.num_chromosomes
    );
    for (chrom, n) in &stats.regions_per_chrom {
        eprintln!("  {}\t{}", chrom, n);
    }
}

fn run_tss(
    bedgraph: PathBuf,
    regions: PathBuf,
    width: usize,
    region_size: i64,
    no_normalize: bool,
    output: Option<PathBuf>,
    stats: bool,
) -> Result<()> {
    let tracks = read_bedgraph_path(bedgraph)?;
    let regions = read_bed_path(regions)?;
    if stats {
        print_stats(&regions);
    }
    let cmd = TssProfile {
        figure_width: width,
        region_size,
        normalize: !no_normalize,
    };
    cmd.run(&tracks, &regions)?.write_tsv(open_output(output)?)
}

fn run_average(
    bedgraph: PathBuf,
    regions: PathBuf,
    width: usize,
    no_normalize: bool,
    output: Option<PathBuf>,
    stats: bool,
) -> Result<()> {
    let tracks = read_bedgraph_path(bedgraph)?;
    let regions = read_bed_path(regions)?;
    if stats {
        print_stats(&regions);
    }
    let cmd = AverageProfile {
        figure_width: width,
        normalize: !no_normalize,
    };
    cmd.run(&tracks, &regions)?.write_tsv(open_output(output)?)
}

fn run_heat(
    bedgraph: PathBuf,
    regions: PathBuf,
    width: usize,
    region_size: i64,
    aspect_ratio: f64,
    no_normalize: bool,
    output: Option<PathBuf>,
    stats: bool,
) -> Result<()> {
    let tracks = read_bedgraph_path(bedgraph)?;
    let regions = read_bed_path(regions)?;
    if stats {
        print_stats(&regions);
    }
    let cmd = HeatProfile {
        figure_width: width,
        region_size,
        aspect_ratio,
        normalize: !no_normalize,
    };
    cmd.run(&tracks, &regions)?.write_tsv(open_output(output)?)
}

fn run_vplot(
    bedgraph: PathBuf,
    regions: PathBuf,
    width: usize,
    region_size: i64,
    aspect_ratio: f64,
    no_normalize: bool,
    output: Option<PathBuf>,
    stats: bool,
) -> Result<()> {
    let tracks = read_bedgraph_path(bedgraph)?;
    let regions = read_bed_path(regions)?;
    if stats {
        print_stats(&regions);
    }
    let cmd = VProfile {
        figure_width: width,
        region_size,
        aspect_ratio,
        normalize: !no_normalize,
    };
    cmd.run(&tracks, &regions)?.write_tsv(open_output(output)?)
}

fn run_gene(
    bedgraph: PathBuf,
    refseq: PathBuf,
    width: usize,
    no_normalize: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let tracks = read_bedgraph_path(bedgraph)?;
    let genes = read_refseq_path(refseq)?;
    let cmd = GeneProfile {
        figure_width: width,
        normalize: !no_normalize,
    };
    cmd.run(&tracks, &genes)?.write_tsv(open_output(output)?)
}

fn run_coverage(regions: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let regions = read_bed_path(regions)?;
    let mut chroms: Vec<String> = regions.keys().cloned().collect();
    chroms.sort();
    let mut tracks: Vec<(String, BedGraph)> = Vec::with_capacity(chroms.len());
    for chrom in chroms {
        let depth = coverage(&regions[&chrom])?;
        tracks.push((chrom, depth));
    }
    write_bedgraph(open_output(output)?, &tracks)
}
