//! CLI run: dispatches parsed commands to the library API.

use std::fmt::Write as _;
use std::path::PathBuf;

use tracing::info;

use crate::cli::output;
use crate::cli::parse::{Cli, Commands, SelectArgs};
use crate::error::Error;
use crate::fetch;
use crate::format::{self, NodeView};
use crate::tree::{PruneOptions, Tree};

/// Execute a command and return its standard output.
pub fn run(cli: &Cli) -> Result<String, Error> {
    match &cli.command {
        Commands::Ls { select } => show(cli, select, None, &[], true),
        Commands::Show {
            select,
            format,
            values,
        } => show(cli, select, format.as_deref(), values, false),
        Commands::Init { paths } => init(paths),
        Commands::Clean => clean(),
    }
}

fn init(paths: &[PathBuf]) -> Result<String, Error> {
    let paths = if paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        paths.to_vec()
    };
    let mut output = String::new();
    for path in paths {
        let root = Tree::init(&path)?;
        writeln!(
            output,
            "Metadata tree '{}' successfully initialized.",
            root.display()
        )
        .expect("writing to a string cannot fail");
    }
    Ok(output)
}

fn clean() -> Result<String, Error> {
    let cache = fetch::clean_cache_directory(None)?;
    Ok(format!(
        "Cache directory '{}' has been removed.\n",
        cache.display()
    ))
}

fn show(
    cli: &Cli,
    select: &SelectArgs,
    formatting: Option<&str>,
    values: &[String],
    brief: bool,
) -> Result<String, Error> {
    let paths = if select.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        select.paths.clone()
    };
    let mut shows: Vec<String> = Vec::new();
    for path in &paths {
        if cli.verbose {
            eprintln!("Checking {} for metadata.", path.display());
        }
        let tree = Tree::grow(path)?;
        info!(root = ?tree.root_path(), "Tree grown");
        let root_text = tree
            .root_path()
            .map(|root| root.display().to_string());

        let options = PruneOptions {
            whole: select.whole,
            keys: select.keys.clone(),
            names: select.names.clone(),
            filters: select.filters.clone(),
            ..PruneOptions::default()
        };
        'nodes: for id in tree.prune(&options)? {
            let node = tree.node(id);
            let view = NodeView {
                name: &node.name,
                root: root_text.as_deref(),
                data: &node.data,
            };
            for condition in &select.conditions {
                if !format::evaluate_condition(condition, view)? {
                    continue 'nodes;
                }
            }
            let mut text = if brief {
                output::format_node_brief(node)
            } else if let Some(formatting) = formatting {
                format::render(formatting, values, view)?
            } else {
                output::format_node_full(node)
            };
            if cli.debug {
                text.push_str(&output::format_sources(node));
            }
            shows.push(text);
        }
    }

    if cli.verbose {
        eprintln!("Found {}.", output::listed(shows.len(), "object"));
    }
    // Full listings get a blank line between nodes
    if brief || formatting.is_some() {
        Ok(shows.concat())
    } else {
        Ok(shows.join("\n"))
    }
}
