use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "audiobook-meta")]
#[command(about = "Extract, merge, and validate audiobook metadata for tracker uploads")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase output verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/audiobook-meta/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every metadata source and print the merged record
    Extract {
        /// Audiobook file or release directory
        path: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Skip the metadata API
        #[arg(long)]
        offline: bool,
    },

    /// Check a release against required and recommended fields
    Validate {
        /// Audiobook file or release directory
        path: PathBuf,

        /// Add a tracker's upload hints (e.g. red)
        #[arg(long)]
        tracker: Option<String>,

        /// Skip the metadata API
        #[arg(long)]
        offline: bool,

        /// Output the validation result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a tracker's upload fields for a release
    Map {
        /// Audiobook file or release directory
        path: PathBuf,

        /// Target tracker
        #[arg(long, default_value = "red")]
        tracker: String,

        /// Skip the metadata API
        #[arg(long)]
        offline: bool,
    },

    /// Show which source wins for each field
    Precedence,
}
