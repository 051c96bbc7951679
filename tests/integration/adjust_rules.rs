//! Integration tests for context-driven adjust rules

use super::test_utils::write_tree;
use fmf::{AdjustOptions, Context, Outcome, Tree, Value};
use tempfile::TempDir;

fn grown(files: &[(&str, &str)]) -> Tree {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), files);
    Tree::grow(temp.path()).unwrap()
}

#[test]
fn test_adjust_applies_matching_rule() {
    let mut tree = grown(&[(
        "main.fmf",
        "/test:\n  enabled: true\n  adjust:\n    when: distro == fedora\n    enabled: false\n    because: not supported there\n",
    )]);
    let context = Context::new().with_dimension("distro", ["fedora-33"]);
    tree.adjust(&context, &AdjustOptions::default()).unwrap();
    let node = tree.node(tree.find("/test").unwrap());
    assert_eq!(node.data["enabled"], Value::Bool(false));
}

#[test]
fn test_adjust_skips_non_matching_rule() {
    let mut tree = grown(&[(
        "main.fmf",
        "/test:\n  enabled: true\n  adjust:\n    when: distro == centos\n    enabled: false\n",
    )]);
    let context = Context::new().with_dimension("distro", ["fedora-33"]);
    tree.adjust(&context, &AdjustOptions::default()).unwrap();
    let node = tree.node(tree.find("/test").unwrap());
    assert_eq!(node.data["enabled"], Value::Bool(true));
}

#[test]
fn test_adjust_whole_subtree() {
    let mut tree = grown(&[
        (
            "main.fmf",
            "adjust:\n  when: arch == s390x\n  enabled: false\n",
        ),
        ("one/main.fmf", "test: one.sh\n"),
        ("two/main.fmf", "test: two.sh\n"),
    ]);
    let context = Context::new().with_dimension("arch", ["s390x"]);
    tree.adjust(&context, &AdjustOptions::default()).unwrap();
    for name in ["/one", "/two"] {
        let node = tree.node(tree.find(name).unwrap());
        assert_eq!(node.data["enabled"], Value::Bool(false), "node {name}");
        assert!(node.adjusted);
    }
}

#[test]
fn test_adjust_custom_key() {
    let mut tree = grown(&[(
        "main.fmf",
        "/test:\n  enabled: true\n  tweak:\n    when: distro == fedora\n    enabled: false\n",
    )]);
    let context = Context::new().with_dimension("distro", ["fedora"]);
    let options = AdjustOptions {
        key: String::from("tweak"),
        ..AdjustOptions::default()
    };
    tree.adjust(&context, &options).unwrap();
    let node = tree.node(tree.find("/test").unwrap());
    assert_eq!(node.data["enabled"], Value::Bool(false));
}

#[test]
fn test_minor_scoped_comparison_scenarios() {
    // centos-7.9 against ~< centos-8.2 cannot be decided, against
    // ~< centos-7.10 it can
    let context = Context::new().with_dimension("distro", ["centos-7.9"]);
    assert_eq!(
        context.matches("distro ~< centos-8.2").unwrap(),
        Outcome::CannotDecide
    );
    assert_eq!(
        context.matches("distro ~< centos-7.10").unwrap(),
        Outcome::True
    );
}

#[test]
fn test_adjust_idempotent_on_disk_tree() {
    let files = [(
        "main.fmf",
        "/test:\n  enabled: true\n  adjust:\n    when: distro == fedora\n    enabled: false\n",
    )];
    let context = Context::new().with_dimension("distro", ["fedora"]);
    let mut tree = grown(&files);
    tree.adjust(&context, &AdjustOptions::default()).unwrap();
    let once: Vec<_> = tree
        .climb(true)
        .map(|id| tree.node(id).data.clone())
        .collect();
    tree.adjust(&context, &AdjustOptions::default()).unwrap();
    let twice: Vec<_> = tree
        .climb(true)
        .map(|id| tree.node(id).data.clone())
        .collect();
    assert_eq!(once, twice);
}

#[test]
fn test_adjust_rule_without_when_always_applies() {
    let mut tree = grown(&[(
        "main.fmf",
        "/test:\n  enabled: true\n  adjust:\n    enabled: false\n",
    )]);
    tree.adjust(&Context::new(), &AdjustOptions::default())
        .unwrap();
    let node = tree.node(tree.find("/test").unwrap());
    assert_eq!(node.data["enabled"], Value::Bool(false));
}
