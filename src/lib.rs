//! fmf: Flexible Metadata Format
//!
//! Materialises a hierarchical metadata tree from YAML documents laid out
//! on a filesystem, applying inheritance, typed merge operators,
//! directives and context-conditional adjustments, and exposes selection
//! and filtering over the resulting nodes.

pub mod cli;
pub mod context;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod format;
pub mod logging;
pub mod merge;
pub mod tree;
pub mod value;

pub use context::{Context, Outcome};
pub use error::Error;
pub use tree::{AdjustOptions, Node, NodeId, PruneOptions, Tree, Undecided};
pub use value::{Map, Value};
