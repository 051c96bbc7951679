//! Integration tests for the fmf command line interface

use super::test_utils::write_tree;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fmf() -> Command {
    let mut command = Command::cargo_bin("fmf").unwrap();
    command.env("NO_COLOR", "1");
    command
}

fn sample_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[
            ("main.fmf", "test: run.sh\n"),
            ("fast/main.fmf", "tag: [Tier1]\ntier: 1\n"),
            ("slow/main.fmf", "tag: [Tier3]\ntier: 3\n"),
        ],
    );
    temp
}

#[test]
fn test_init_creates_version_file() {
    let temp = TempDir::new().unwrap();
    fmf()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("successfully initialized"));
    let version = std::fs::read_to_string(temp.path().join(".fmf").join("version")).unwrap();
    assert_eq!(version.trim(), "1");
}

#[test]
fn test_init_fails_when_already_present() {
    let temp = TempDir::new().unwrap();
    fmf().current_dir(temp.path()).arg("init").assert().success();
    fmf()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_ls_lists_leaf_names() {
    let temp = sample_tree();
    fmf()
        .current_dir(temp.path())
        .arg("ls")
        .assert()
        .success()
        .stdout("/fast\n/slow\n");
}

#[test]
fn test_ls_whole_includes_root() {
    let temp = sample_tree();
    fmf()
        .current_dir(temp.path())
        .args(["ls", "--whole"])
        .assert()
        .success()
        .stdout("/\n/fast\n/slow\n");
}

#[test]
fn test_ls_with_name_and_key() {
    let temp = sample_tree();
    fmf()
        .current_dir(temp.path())
        .args(["ls", "--name", "fast"])
        .assert()
        .success()
        .stdout("/fast\n");
    fmf()
        .current_dir(temp.path())
        .args(["ls", "--key", "tier"])
        .assert()
        .success()
        .stdout("/fast\n/slow\n");
}

#[test]
fn test_ls_with_filter() {
    let temp = sample_tree();
    fmf()
        .current_dir(temp.path())
        .args(["ls", "--filter", "tag: Tier1"])
        .assert()
        .success()
        .stdout("/fast\n");
}

#[test]
fn test_ls_with_condition() {
    let temp = sample_tree();
    fmf()
        .current_dir(temp.path())
        .args(["ls", "--condition", "tier == 3"])
        .assert()
        .success()
        .stdout("/slow\n");
}

#[test]
fn test_show_prints_attributes() {
    let temp = sample_tree();
    fmf()
        .current_dir(temp.path())
        .args(["show", "--name", "fast"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/fast"))
        .stdout(predicate::str::contains("tier: 1"))
        .stdout(predicate::str::contains("test: run.sh"));
}

#[test]
fn test_show_custom_format() {
    let temp = sample_tree();
    fmf()
        .current_dir(temp.path())
        .args([
            "show",
            "--name",
            "fast",
            "--format",
            "{0} runs {1}\\n",
            "--value",
            "name",
            "--value",
            "data.test",
        ])
        .assert()
        .success()
        .stdout("/fast runs run.sh\n");
}

#[test]
fn test_show_path_option() {
    let temp = sample_tree();
    fmf()
        .args(["ls", "--path", temp.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout("/fast\n/slow\n");
}

#[test]
fn test_missing_tree_is_operational_error() {
    let temp = TempDir::new().unwrap();
    fmf()
        .current_dir(temp.path())
        .arg("ls")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Unable to find tree root"));
}

#[test]
fn test_usage_error_exit_code() {
    fmf().arg("--no-such-flag").assert().code(2);
}

#[test]
fn test_verbose_reports_summary() {
    let temp = sample_tree();
    fmf()
        .current_dir(temp.path())
        .args(["ls", "--verbose"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Found 2 objects."));
}

#[test]
fn test_debug_lists_sources() {
    let temp = sample_tree();
    fmf()
        .current_dir(temp.path())
        .args(["ls", "--debug", "--name", "fast"])
        .assert()
        .success()
        .stdout(predicate::str::contains("main.fmf"));
}

#[test]
fn test_piped_output_has_no_color_codes() {
    // No NO_COLOR override here: stdout is a pipe, so the tty detection
    // alone must keep escape codes out of the output
    let temp = sample_tree();
    Command::cargo_bin("fmf")
        .unwrap()
        .current_dir(temp.path())
        .arg("ls")
        .assert()
        .success()
        .stdout("/fast\n/slow\n");
    Command::cargo_bin("fmf")
        .unwrap()
        .current_dir(temp.path())
        .args(["show", "--name", "fast"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\u{1b}").not());
}

#[test]
fn test_clean_removes_cache_directory() {
    let temp = sample_tree();
    let cache = TempDir::new().unwrap();
    let cache_dir = cache.path().join("fmf-cache");
    std::fs::create_dir_all(cache_dir.join("some-repo")).unwrap();
    fmf()
        .current_dir(temp.path())
        .env("FMF_CACHE_DIRECTORY", &cache_dir)
        .arg("clean")
        .assert()
        .success()
        .stdout(predicate::str::contains("has been removed"));
    assert!(!cache_dir.exists());
}
