//! Integration tests for tree discovery and assembly

use super::test_utils::{all_names, write_tree};
use fmf::{Error, Tree, Value};
use tempfile::TempDir;

#[test]
fn test_simple_tree_from_disk() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[
            ("main.fmf", "tag: [a]\ntest: run.sh\n"),
            ("c/main.fmf", "tag+: [b]\n"),
        ],
    );
    let tree = Tree::grow(temp.path()).unwrap();
    assert_eq!(all_names(&tree), vec!["/", "/c"]);

    let root = tree.node(tree.find("/").unwrap());
    assert_eq!(
        root.data["tag"],
        Value::List(vec![Value::from("a")])
    );

    let child = tree.node(tree.find("/c").unwrap());
    assert_eq!(
        child.data["tag"],
        Value::List(vec![Value::from("a"), Value::from("b")])
    );
    assert_eq!(child.data["test"], Value::from("run.sh"));
}

#[test]
fn test_grow_from_subdirectory_finds_root() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[("main.fmf", "x: 1\n"), ("a/b/main.fmf", "y: 2\n")],
    );
    let from_root = Tree::grow(temp.path()).unwrap();
    let from_deep = Tree::grow(temp.path().join("a").join("b")).unwrap();
    assert_eq!(all_names(&from_root), all_names(&from_deep));
    assert_eq!(from_root.version(), 1);
}

#[test]
fn test_file_and_directory_scattering() {
    // c.fmf and c/main.fmf both contribute to /c, file first
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[
            ("main.fmf", "tag: [a]\n"),
            ("c.fmf", "note: from-file\ntag+: [b]\n"),
            ("c/main.fmf", "extra: from-directory\n"),
        ],
    );
    let tree = Tree::grow(temp.path()).unwrap();
    let child = tree.node(tree.find("/c").unwrap());
    assert_eq!(child.data["note"], Value::from("from-file"));
    assert_eq!(child.data["extra"], Value::from("from-directory"));
    assert_eq!(
        child.data["tag"],
        Value::List(vec![Value::from("a"), Value::from("b")])
    );
    assert_eq!(child.sources.len(), 3);
}

#[test]
fn test_virtual_hierarchy_from_file() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[(
            "main.fmf",
            "x: 1\n/plans/basic:\n  summary: basic plan\n/plans/full:\n  summary: full plan\n",
        )],
    );
    let tree = Tree::grow(temp.path()).unwrap();
    assert_eq!(all_names(&tree), vec!["/", "/plans", "/plans/basic", "/plans/full"]);
    let basic = tree.node(tree.find("/plans/basic").unwrap());
    assert_eq!(basic.data["summary"], Value::from("basic plan"));
    assert_eq!(basic.data["x"], Value::Int(1));
}

#[test]
fn test_directories_without_metadata_are_pruned() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[("main.fmf", "x: 1\n"), ("docs/readme.txt", "no metadata\n")],
    );
    std::fs::create_dir_all(temp.path().join("empty")).unwrap();
    let tree = Tree::grow(temp.path()).unwrap();
    assert_eq!(all_names(&tree), vec!["/"]);
}

#[test]
fn test_sources_accumulate_through_inheritance() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[("main.fmf", "x: 1\n"), ("c/main.fmf", "y: 2\n")],
    );
    let tree = Tree::grow(temp.path()).unwrap();
    let root_sources = &tree.node(tree.find("/").unwrap()).sources;
    let child_sources = &tree.node(tree.find("/c").unwrap()).sources;
    assert_eq!(root_sources.len(), 1);
    assert_eq!(child_sources.len(), 2);
    assert!(child_sources.contains(&root_sources[0]));
}

#[test]
fn test_missing_root_marker() {
    let temp = TempDir::new().unwrap();
    assert!(matches!(
        Tree::grow(temp.path()).unwrap_err(),
        Error::RootMissing(_)
    ));
}

#[test]
fn test_invalid_yaml_is_fatal() {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &[("main.fmf", "a: [unclosed\n")]);
    assert!(matches!(
        Tree::grow(temp.path()).unwrap_err(),
        Error::Yaml { .. }
    ));
}

#[test]
fn test_duplicate_key_is_fatal() {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &[("main.fmf", "a: 1\na: 2\n")]);
    assert!(matches!(
        Tree::grow(temp.path()).unwrap_err(),
        Error::Yaml { .. }
    ));
}

#[test]
fn test_non_mapping_document_is_fatal() {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &[("list.fmf", "- a\n- b\n")]);
    assert!(matches!(
        Tree::grow(temp.path()).unwrap_err(),
        Error::InvalidSyntax { .. }
    ));
}

#[test]
fn test_empty_file_creates_empty_node() {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &[("main.fmf", "x: 1\n"), ("c/main.fmf", "")]);
    let tree = Tree::grow(temp.path()).unwrap();
    let child = tree.node(tree.find("/c").unwrap());
    // Inherits everything from the parent
    assert_eq!(child.data["x"], Value::Int(1));
}

#[test]
fn test_main_goes_first_within_directory() {
    // main.fmf defines the base, sibling files inherit from the updated node
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[
            ("tests/aaa.fmf", "tag+: [extra]\n"),
            ("tests/main.fmf", "tag: [base]\n"),
        ],
    );
    let tree = Tree::grow(temp.path()).unwrap();
    let node = tree.node(tree.find("/tests/aaa").unwrap());
    assert_eq!(
        node.data["tag"],
        Value::List(vec![Value::from("base"), Value::from("extra")])
    );
}

#[test]
fn test_deterministic_assembly() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[
            ("main.fmf", "x: 1\n"),
            ("b/main.fmf", "y: 2\n"),
            ("a/main.fmf", "z: 3\n"),
            ("a/deep/main.fmf", "w: 4\n"),
        ],
    );
    let first = Tree::grow(temp.path()).unwrap();
    let second = Tree::grow(temp.path()).unwrap();
    assert_eq!(all_names(&first), all_names(&second));
    for id in first.climb(true) {
        let name = &first.node(id).name;
        let other = second.find(name).unwrap();
        assert_eq!(first.node(id).data, second.node(other).data);
    }
}
