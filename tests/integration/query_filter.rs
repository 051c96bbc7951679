//! Integration tests for tree queries and filtering

use super::test_utils::{leaf_names, write_tree};
use fmf::{PruneOptions, Tree};
use tempfile::TempDir;

fn grown() -> (TempDir, Tree) {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[
            ("main.fmf", "test: run.sh\n"),
            ("fast/main.fmf", "tag: [Tier1]\ntier: 1\n"),
            ("slow/main.fmf", "tag: [Tier3]\ntier: 3\n"),
            ("docs/main.fmf", "summary: no test here\ntest-: '.*'\n"),
        ],
    );
    let tree = Tree::grow(temp.path()).unwrap();
    (temp, tree)
}

fn pruned(tree: &Tree, options: &PruneOptions) -> Vec<String> {
    tree.prune(options)
        .unwrap()
        .into_iter()
        .map(|id| tree.node(id).name.clone())
        .collect()
}

#[test]
fn test_prune_by_required_keys() {
    let (_temp, tree) = grown();
    let options = PruneOptions {
        keys: vec![String::from("tier")],
        ..PruneOptions::default()
    };
    assert_eq!(pruned(&tree, &options), vec!["/fast", "/slow"]);
}

#[test]
fn test_prune_by_name_regex() {
    let (_temp, tree) = grown();
    let options = PruneOptions {
        names: vec![String::from("slo")],
        ..PruneOptions::default()
    };
    assert_eq!(pruned(&tree, &options), vec!["/slow"]);
}

#[test]
fn test_prune_with_escaped_filter_operator() {
    let (_temp, tree) = grown();
    let options = PruneOptions {
        filters: vec![String::from(r"tag: Tier(1\|2)")],
        ..PruneOptions::default()
    };
    assert_eq!(pruned(&tree, &options), vec!["/fast"]);
}

#[test]
fn test_prune_filter_with_name_atom() {
    let (_temp, tree) = grown();
    let options = PruneOptions {
        filters: vec![String::from("fast & tag: Tier1")],
        ..PruneOptions::default()
    };
    assert_eq!(pruned(&tree, &options), vec!["/fast"]);
}

#[test]
fn test_prune_whole_includes_branches() {
    let (_temp, tree) = grown();
    let options = PruneOptions {
        whole: true,
        ..PruneOptions::default()
    };
    assert_eq!(
        pruned(&tree, &options),
        vec!["/", "/docs", "/fast", "/slow"]
    );
}

#[test]
fn test_prune_by_source_file() {
    let (temp, tree) = grown();
    let options = PruneOptions {
        sources: vec![temp.path().join("fast").join("main.fmf")],
        ..PruneOptions::default()
    };
    assert_eq!(pruned(&tree, &options), vec!["/fast"]);
}

#[test]
fn test_sorted_traversal() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[
            ("main.fmf", "/zeta:\n  x: 1\n/alpha:\n  x: 2\n"),
        ],
    );
    let tree = Tree::grow(temp.path()).unwrap();
    assert_eq!(leaf_names(&tree), vec!["/zeta", "/alpha"]);
    let options = PruneOptions {
        sort: true,
        ..PruneOptions::default()
    };
    assert_eq!(pruned(&tree, &options), vec!["/alpha", "/zeta"]);
}

#[test]
fn test_reduce_empties_inherited_string() {
    // The docs node wiped the inherited 'test' command with 'test-'
    let (_temp, tree) = grown();
    let docs = tree.node(tree.find("/docs").unwrap());
    assert_eq!(docs.data["test"], fmf::Value::from(""));
}
