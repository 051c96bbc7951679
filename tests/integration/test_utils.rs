//! Shared test utilities for integration tests

use std::fs;
use std::path::Path;

/// Create a metadata tree on disk: the `.fmf/version` marker plus the
/// given files (relative path, content), creating parent directories.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    fs::create_dir_all(root.join(".fmf")).unwrap();
    fs::write(root.join(".fmf").join("version"), "1\n").unwrap();
    for (path, content) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }
}

/// Collect the names of all nodes yielded by a default climb.
pub fn leaf_names(tree: &fmf::Tree) -> Vec<String> {
    tree.climb(false)
        .map(|id| tree.node(id).name.clone())
        .collect()
}

/// Collect the names of all nodes including branches.
pub fn all_names(tree: &fmf::Tree) -> Vec<String> {
    tree.climb(true)
        .map(|id| tree.node(id).name.clone())
        .collect()
}
