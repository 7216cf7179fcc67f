use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const RELEASE: &str = "Dune - vol_01 (1965) (Frank Herbert) {ASIN.B000FC1ZCS} [x]";

/// A release directory with one unreadable "audio" file and a config that
/// keeps extraction local.
struct Fixture {
    _dir: TempDir,
    release: PathBuf,
    config: PathBuf,
}

fn fixture(name: &str) -> Fixture {
    let dir = TempDir::new().unwrap();
    let release = dir.path().join(name);
    fs::create_dir(&release).unwrap();
    fs::write(release.join("part1.mp3"), b"not really audio").unwrap();

    let config = dir.path().join("config.toml");
    fs::write(&config, "[embedded]\nuse_ffprobe = false\n").unwrap();

    Fixture {
        _dir: dir,
        release,
        config,
    }
}

fn cmd(fixture: &Fixture) -> Command {
    let mut cmd = Command::cargo_bin("audiobook-meta").unwrap();
    cmd.arg("--config").arg(&fixture.config);
    cmd
}

#[test]
fn test_help() {
    let mut cmd = Command::cargo_bin("audiobook-meta").unwrap();
    cmd.args(["extract", "--help"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Run every metadata source"));
}

#[test]
fn test_version() {
    let mut cmd = Command::cargo_bin("audiobook-meta").unwrap();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("audiobook-meta"));
}

#[test]
fn test_extract_missing_path_returns_error() {
    let f = fixture(RELEASE);
    cmd(&f)
        .args(["extract", "--offline", "/nonexistent/book.m4b"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Path not found"));
}

#[test]
fn test_extract_json_offline() {
    let f = fixture(RELEASE);
    cmd(&f)
        .args(["extract", "--offline", "--json"])
        .arg(&f.release)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"title\": \"Dune\""))
        .stdout(predicate::str::contains("Frank Herbert"))
        .stdout(predicate::str::contains("\"volume\": \"01\""))
        .stdout(predicate::str::contains("B000FC1ZCS"))
        .stdout(predicate::str::contains("part1.mp3"));
}

#[test]
fn test_extract_pretty_offline() {
    let f = fixture(RELEASE);
    cmd(&f)
        .args(["extract", "--offline"])
        .arg(&f.release)
        .assert()
        .success()
        .stdout(predicate::str::contains("Dune #01"))
        .stdout(predicate::str::contains("1965"));
}

#[test]
fn test_validate_passes_core_rules() {
    let f = fixture(RELEASE);
    cmd(&f)
        .args(["validate", "--offline"])
        .arg(&f.release)
        .assert()
        .success()
        .stdout(predicate::str::contains("narrators: missing"));
}

#[test]
fn test_validate_reports_missing_fields() {
    let f = fixture("untitled rip");
    cmd(&f)
        .args(["validate", "--offline"])
        .arg(&f.release)
        .assert()
        .failure()
        .stdout(predicate::str::contains("authors: missing"))
        .stderr(predicate::str::contains("validation failed"));
}

#[test]
fn test_validate_json_shape() {
    let f = fixture("untitled rip");
    cmd(&f)
        .args(["validate", "--offline", "--json"])
        .arg(&f.release)
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"completeness\""))
        .stdout(predicate::str::contains("\"valid\": false"));
}

#[test]
fn test_validate_with_red_hints() {
    let f = fixture(RELEASE);
    cmd(&f)
        .args(["validate", "--offline", "--tracker", "red"])
        .arg(&f.release)
        .assert()
        .failure()
        .stdout(predicate::str::contains("tags: missing"));
}

#[test]
fn test_unknown_tracker() {
    let f = fixture(RELEASE);
    cmd(&f)
        .args(["map", "--offline", "--tracker", "nope"])
        .arg(&f.release)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown tracker"));
}

#[test]
fn test_map_refuses_invalid_record() {
    let f = fixture(RELEASE);
    cmd(&f)
        .args(["map", "--offline"])
        .arg(&f.release)
        .assert()
        .failure()
        .stdout(predicate::str::contains("tags: missing"))
        .stdout(predicate::str::contains("album_desc").not());
}

#[test]
fn test_precedence_table() {
    let f = fixture(RELEASE);
    cmd(&f)
        .arg("precedence")
        .assert()
        .success()
        .stdout(predicate::str::contains("api > path"))
        .stdout(predicate::str::contains("embedded > api"))
        .stdout(predicate::str::contains("(union)"));
}

#[test]
fn test_precedence_override_from_config() {
    let f = fixture(RELEASE);
    fs::write(&f.config, "[merge.precedence]\ntitle = [\"path\", \"api\"]\n").unwrap();
    cmd(&f)
        .arg("precedence")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"title\s+path > api").unwrap());
}

#[test]
fn test_bad_config_is_reported() {
    let f = fixture(RELEASE);
    fs::write(&f.config, "[merge.precedence]\ntitle = [\"wikipedia\"]\n").unwrap();
    cmd(&f)
        .arg("precedence")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid [merge] configuration"));
}

#[test]
fn test_missing_config_override() {
    let mut cmd = Command::cargo_bin("audiobook-meta").unwrap();
    cmd.args(["--config", "/nonexistent/config.toml", "precedence"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}
