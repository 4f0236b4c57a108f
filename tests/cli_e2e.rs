//! End-to-end CLI tests for the epf binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const GENRE: &[u8] = b"#genre_id\x01name\x02\n\
#primaryKey:genre_id\x02\n\
#dbTypes:INTEGER\x01VARCHAR(200)\x02\n\
#exportMode:FULL\x02\n\
34\x01Music\x02\n\
#recordsWritten:1\x02\n";

/// Binary with an empty config home so a developer's config is not picked up.
fn epf(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("epf").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG")
        .env_remove("EPF_USERNAME")
        .env_remove("EPF_PASSWORD");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    epf(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Crawl, download and decode EPF data exports"))
        .stdout(predicate::str::contains("sync"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    epf(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("epf"));
}

#[test]
fn test_binary_without_subcommand_fails() {
    let home = TempDir::new().unwrap();
    epf(&home).assert().failure();
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let home = TempDir::new().unwrap();
    epf(&home)
        .args(["parse", "genre", "--invalid-flag"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_parse_prints_json_summary() {
    let home = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let path = data.path().join("genre");
    std::fs::write(&path, GENRE).unwrap();

    epf(&home)
        .arg("parse")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""file_name":"genre""#))
        .stdout(predicate::str::contains(r#""records_expected":1"#))
        .stdout(predicate::str::contains(
            r#"{"name":"name","db_type":"VARCHAR(200)"}"#,
        ))
        .stdout(predicate::str::contains("verified_records").not());
}

#[test]
fn test_parse_verifies_and_samples_records() {
    let home = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let path = data.path().join("genre");
    std::fs::write(&path, GENRE).unwrap();

    epf(&home)
        .args(["-q", "parse", "--verify-count", "--sample", "5"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""verified_records":1"#))
        .stdout(predicate::str::contains(r#""sample":[["34","Music"]]"#));
}

#[test]
fn test_parse_missing_file_fails() {
    let home = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    epf(&home)
        .arg("parse")
        .arg(data.path().join("absent.tbz"))
        .assert()
        .failure();
}

#[test]
fn test_crawl_rejects_invalid_match_pattern() {
    let home = TempDir::new().unwrap();
    epf(&home)
        .args(["crawl", "http://127.0.0.1:9/epf/", "--match", "("])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --match pattern"));
}

#[test]
fn test_download_skips_existing_file_offline() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    std::fs::write(out.path().join("itunes20240101.tbz"), b"done").unwrap();

    epf(&home)
        .args(["download", "http://127.0.0.1:9/epf/itunes20240101.tbz", "-o"])
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("itunes20240101.tbz"));
}

#[test]
fn test_invalid_config_file_fails() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.toml");
    std::fs::write(&config, "retries = lots\n").unwrap();

    epf(&home)
        .arg("--config")
        .arg(&config)
        .args(["parse", "genre"])
        .assert()
        .failure();
}
