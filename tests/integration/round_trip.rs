//! Integration tests for round-trip writes

use super::test_utils::write_tree;
use fmf::{Tree, Value};
use tempfile::TempDir;

#[test]
fn test_modify_attribute_and_regrow() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[("test/main.fmf", "summary: original\ntier: 2\n")],
    );
    let mut tree = Tree::grow(temp.path()).unwrap();
    let id = tree.find("/test").unwrap();
    let source = tree
        .modify(id, |data| {
            data.insert(String::from("tier"), Value::Int(0));
        })
        .unwrap();
    assert!(source.ends_with("test/main.fmf"));

    let regrown = Tree::grow(temp.path()).unwrap();
    let node = regrown.node(regrown.find("/test").unwrap());
    assert_eq!(node.data["tier"], Value::Int(0));
    assert_eq!(node.data["summary"], Value::from("original"));
}

#[test]
fn test_modify_preserves_key_order() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[("main.fmf", "zebra: 1\napple: 2\nmango: 3\n")],
    );
    let mut tree = Tree::grow(temp.path()).unwrap();
    let id = tree.find("/").unwrap();
    tree.modify(id, |data| {
        data.insert(String::from("apple"), Value::Int(7));
    })
    .unwrap();

    let regrown = Tree::grow(temp.path()).unwrap();
    let node = regrown.node(regrown.find("/").unwrap());
    let keys: Vec<&String> = node.data.keys().collect();
    assert_eq!(keys, vec!["zebra", "apple", "mango"]);
    assert_eq!(node.data["apple"], Value::Int(7));
}

#[test]
fn test_modify_virtual_node_goes_to_parent_source() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[("main.fmf", "/virtual:\n  x: 1\n")],
    );
    let mut tree = Tree::grow(temp.path()).unwrap();
    let id = tree.find("/virtual").unwrap();
    let source = tree
        .modify(id, |data| {
            data.insert(String::from("y"), Value::Int(2));
        })
        .unwrap();
    assert!(source.ends_with("main.fmf"));

    let regrown = Tree::grow(temp.path()).unwrap();
    let node = regrown.node(regrown.find("/virtual").unwrap());
    assert_eq!(node.data["x"], Value::Int(1));
    assert_eq!(node.data["y"], Value::Int(2));
}

#[test]
fn test_noop_modify_round_trips_data() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[
            ("main.fmf", "tag: [a, b]\ntest: run.sh\nnested:\n  deep: [1, 2.5, true]\n"),
            ("c/main.fmf", "tag+: [c]\n"),
        ],
    );
    let before = Tree::grow(temp.path()).unwrap();
    let mut tree = Tree::grow(temp.path()).unwrap();
    for name in ["/", "/c"] {
        let id = tree.find(name).unwrap();
        tree.modify(id, |_data| {}).unwrap();
    }
    let after = Tree::grow(temp.path()).unwrap();
    for id in before.climb(true) {
        let name = &before.node(id).name;
        let other = after.find(name).expect(name);
        assert_eq!(before.node(id).data, after.node(other).data, "node {name}");
    }
}

#[test]
fn test_modify_without_filesystem_fails() {
    let data = fmf::value::parse_document("x: 1\n").unwrap().unwrap();
    let mut tree = Tree::from_data(data).unwrap();
    let id = tree.root_id();
    assert!(tree.modify(id, |_data| {}).is_err());
}
