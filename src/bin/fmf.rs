//! fmf CLI Binary
//!
//! Command-line interface for the Flexible Metadata Format.

use clap::Parser;
use fmf::cli::{run, Cli};
use fmf::logging::{init_logging, LoggingConfig};
use std::io::IsTerminal;
use std::process;
use tracing::error;

fn main() {
    let cli = Cli::parse();
    init_logging(&LoggingConfig::from_flags(cli.verbose, cli.debug));

    // Color only when attached to a terminal; NO_COLOR and friends still
    // apply on a tty
    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    match run(&cli) {
        Ok(output) => print!("{output}"),
        Err(err) => {
            error!("Command failed: {err}");
            if cli.debug {
                eprintln!("Error: {err:?}");
            } else {
                eprintln!("Error: {err}");
            }
            process::exit(1);
        }
    }
}
