//! Error types for the fmf metadata tree library.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while discovering, building, adjusting or querying a
/// metadata tree
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to find tree root for '{0}'.")]
    RootMissing(PathBuf),

    #[error("File error in '{path}': {message}")]
    File { path: PathBuf, message: String },

    #[error("Failed to parse '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid metadata in '{path}': document root must be a mapping.")]
    InvalidSyntax { path: PathBuf },

    #[error("Invalid directive in '{node}': {message}")]
    InvalidDirective { node: String, message: String },

    #[error("Failed to merge key '{key}' in '{node}': {message}")]
    Merge {
        node: String,
        key: String,
        message: String,
    },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("Reference error: {0}")]
    Reference(String),

    #[error("{0}")]
    General(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Filter expression errors
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Invalid filter '{0}'")]
    InvalidFilter(String),

    #[error("Invalid filter pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Filter uses a name atom but no node name was provided")]
    MissingName,
}

/// Context expression errors
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Cannot parse expression '{0}'.")]
    InvalidExpression(String),

    #[error("Invalid context: {0}")]
    InvalidContext(String),

    #[error("Cannot decide rule '{0}'.")]
    CannotDecide(String),
}
