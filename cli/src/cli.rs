use std::path::PathBuf;

/// Feature fusion and energy community selection
#[derive(clap::Parser, Debug)]
#[command(name = "ecomapper", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Fuse the configured datasets into one feature row per address
    Fuse(FuseArgs),

    /// Select and cluster energy community participants from a fused table
    Community(CommunityArgs),
}

#[derive(clap::Args, Debug)]
pub struct FuseArgs {
    /// JSON configuration with source paths, output paths and parameters
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct CommunityArgs {
    /// Fused feature table (CSV)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub table: PathBuf,

    /// JSON object of feature -> [comparator, threshold], e.g. {"population": [">=", 200]}
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub criteria: Option<PathBuf>,

    /// Number of communities
    #[arg(short, long)]
    pub k: usize,

    /// Seed for k-means++ initialisation
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Output table with cluster labels, defaults to "./communities.csv"
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Also write per-cluster feature means to this file
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub summary: Option<PathBuf>,
}
