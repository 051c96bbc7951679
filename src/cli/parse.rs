//! CLI parse: clap types for fmf. No behavior; definitions only.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// fmf - Flexible Metadata Format
#[derive(Parser)]
#[command(name = "fmf")]
#[command(about = "Flexible Metadata Format")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Print information about parsed files to stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Turn on debugging output, show full error details
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List names of available objects
    Ls {
        #[command(flatten)]
        select: SelectArgs,
    },
    /// Show metadata of available objects
    Show {
        #[command(flatten)]
        select: SelectArgs,

        /// Custom output format using {} expansion
        #[arg(long)]
        format: Option<String>,

        /// Values for the custom formatting string
        #[arg(long = "value", value_name = "EXPR")]
        values: Vec<String>,
    },
    /// Initialize a new metadata tree
    Init {
        /// Path where the tree should be created (default: current directory)
        #[arg(long = "path", value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Remove cache directory and its content
    Clean,
}

/// Node selection options shared by `ls` and `show`
#[derive(Args)]
pub struct SelectArgs {
    /// Path to the metadata tree (default: current directory)
    #[arg(long = "path", value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Key content definition (required attributes)
    #[arg(long = "key", value_name = "KEY")]
    pub keys: Vec<String>,

    /// List objects with name matching regular expression
    #[arg(long = "name", value_name = "REGEX")]
    pub names: Vec<String>,

    /// Apply advanced filter (see the filter module documentation)
    #[arg(long = "filter", value_name = "FILTER")]
    pub filters: Vec<String>,

    /// Restricted attribute expression for filtering
    #[arg(long = "condition", value_name = "EXPR")]
    pub conditions: Vec<String>,

    /// Consider the whole tree (leaves only by default)
    #[arg(long)]
    pub whole: bool,
}
