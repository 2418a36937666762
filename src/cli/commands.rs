use crate::retention::MembershipFallback;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// `keepsweep` - delete every row not reachable from a keep set of principals.
#[derive(Parser, Debug)]
#[command(name = "keepsweep")]
#[command(version)]
#[command(about = "Selective-retention garbage collector for relational stores.", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.keepsweep/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log SQL-level detail
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Store and keep-set selection shared by every command that touches a store.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Database file (overrides config and KEEPSWEEP_DATABASE)
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Principal to keep; repeat for several (replaces the configured keep set)
    #[arg(long = "keep", value_name = "ID")]
    pub keep: Vec<String>,

    /// What to do when a tier's membership relation is missing
    #[arg(long, value_enum)]
    pub membership_fallback: Option<MembershipFallback>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Delete everything not reachable from the keep set, in one transaction
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Snapshot the database to this path before deleting
        #[arg(long)]
        backup: Option<PathBuf>,

        /// Skip the interactive confirmation
        #[arg(short, long)]
        yes: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Count what `run` would delete, then roll back
    Plan {
        #[command(flatten)]
        target: TargetArgs,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which declared tables and columns the store has
    Inspect {
        /// Database file (overrides config and KEEPSWEEP_DATABASE)
        #[arg(long)]
        database: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the store against the keep set without deleting anything
    Verify {
        #[command(flatten)]
        target: TargetArgs,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a config file with the built-in schema descriptor
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,

        /// Principal to keep; repeat for several
        #[arg(long = "keep", value_name = "ID")]
        keep: Vec<String>,
    },
}
