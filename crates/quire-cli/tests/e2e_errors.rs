//! E2E CLI tests for failure paths: validation, authorization, post status
//! gating, and the JSON error contract on stderr.

use assert_cmd::Command;
use predicates::prelude::*;
use quire_core::identity::TokenDirectory;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn quire(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("quire"));
    cmd.current_dir(dir);
    cmd.env("QUIRE_LOG", "error");
    cmd.env("QUIRE_CONFIG", dir.join("config.toml"));
    cmd.env_remove("QUIRE_DB");
    cmd.env_remove("QUIRE_FORMAT");
    cmd.arg("--db").arg(dir.join("quire.sqlite3"));
    cmd
}

fn setup() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = format!(
        "[[auth.tokens]]\naccount = \"ann\"\ndigest = \"{}\"\n",
        TokenDirectory::digest("ann-secret")
    );
    std::fs::write(dir.path().join("config.toml"), config).expect("write config");
    quire(dir.path()).arg("init").assert().success();
    quire(dir.path())
        .args(["post", "create", "--slug", "open", "--title", "Open"])
        .assert()
        .success();
    quire(dir.path())
        .args(["post", "create", "--slug", "closed", "--title", "Closed", "--status", "archived"])
        .assert()
        .success();
    dir
}

fn json_error(dir: &Path, args: &[&str]) -> Value {
    let output = quire(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("quire should not crash");
    assert!(!output.status.success(), "{args:?} unexpectedly succeeded");
    let body: Value = serde_json::from_slice(&output.stderr).expect("JSON error on stderr");
    body["error"].clone()
}

#[test]
fn empty_author_name_is_a_validation_error() {
    let dir = setup();
    let err = json_error(
        dir.path(),
        &["comment", "add", "open", "--name", " ", "--content", "hi"],
    );
    assert_eq!(err["error_code"], "E2001");
    assert_eq!(err["fields"][0], "author_name must not be empty");
}

#[test]
fn archived_post_rejects_comments() {
    let dir = setup();
    let err = json_error(
        dir.path(),
        &["comment", "add", "closed", "--name", "Ann", "--content", "late"],
    );
    assert_eq!(err["error_code"], "E2007");
}

#[test]
fn unknown_post_and_parent_are_not_found() {
    let dir = setup();
    let err = json_error(
        dir.path(),
        &["comment", "add", "nope", "--name", "Ann", "--content", "hi"],
    );
    assert_eq!(err["error_code"], "E2002");

    let err = json_error(
        dir.path(),
        &["comment", "add", "open", "--name", "Ann", "--content", "hi", "--parent", "999"],
    );
    assert_eq!(err["error_code"], "E2004");
}

#[test]
fn non_moderator_cannot_moderate() {
    let dir = setup();
    let err = json_error(dir.path(), &["--as", "ann", "moderate", "queue"]);
    assert_eq!(err["error_code"], "E4003");

    let err = json_error(dir.path(), &["--as", "ghost", "moderate", "queue"]);
    assert_eq!(err["error_code"], "E4001");
}

#[test]
fn moderating_a_missing_comment_fails() {
    let dir = setup();
    let err = json_error(dir.path(), &["moderate", "approve", "12345"]);
    assert_eq!(err["error_code"], "E2003");
}

#[test]
fn missing_store_points_at_init() {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(dir.path().join("config.toml"), "").expect("write config");
    quire(dir.path())
        .args(["post", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E1002]"));
}

#[test]
fn broken_config_is_reported() {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(dir.path().join("config.toml"), "[server\nbind = ").expect("write config");
    quire(dir.path())
        .args(["post", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E1001]"));
}

#[test]
fn parser_rejects_unknown_states() {
    let dir = setup();
    quire(dir.path())
        .args(["moderate", "queue", "--state", "rejected"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
