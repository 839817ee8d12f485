use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "retimer")]
#[command(author, version, about = "Reconcile and correct capture timestamps")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the reconciled timestamp and every timestamp tag of each file
    Inspect {
        /// Files or directories to inspect
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Shift timestamps by a delta or towards anchored reference files
    Shift {
        /// Files or directories to correct
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Default correction, e.g. "-2h", "1:30:00", "1d 5m"
        #[arg(short, long, allow_hyphen_values = true)]
        delta: Option<String>,

        /// Pin a file: FILE=TIMESTAMP or FILE=DELTA (repeatable)
        #[arg(short, long, allow_hyphen_values = true)]
        anchor: Vec<String>,

        /// Timezone to write in, e.g. "+02:00"
        #[arg(short, long, allow_hyphen_values = true)]
        timezone: Option<String>,

        /// Show what would be done without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// List or rewrite clip timestamps in an AVCHD directory
    Avchd {
        /// AVCHD directory (usually .../AVCHD/BDMV)
        #[arg(required = true)]
        dir: PathBuf,

        /// Rewrite a clip: CLIP=TIMESTAMP (repeatable)
        #[arg(short, long)]
        set: Vec<String>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
