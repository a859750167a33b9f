//! Integration tests for the pipework CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn pipework(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pipework").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

/// Test CLI binary exists and responds to --help
#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    pipework(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("vowels"))
        .stdout(predicate::str::contains("grades"));
}

#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    pipework(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pipework"));
}

#[test]
fn test_invalid_subcommand() {
    let dir = TempDir::new().unwrap();
    pipework(&dir)
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_vowels_creates_sample_and_reports_every_letter() {
    let dir = TempDir::new().unwrap();
    let output = pipework(&dir)
        .args(["--format", "json", "vowels"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    assert!(dir.path().join("texto.txt").exists());
    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let keys: Vec<&str> = report["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["a", "e", "i", "o", "u"]);
    assert!(report["entries"].as_array().unwrap().iter().all(|e| e["status"] == "ok"));
}

#[test]
fn test_vowels_text_report() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("input.txt"), "Aa bb\n").unwrap();
    pipework(&dir)
        .args(["vowels", "--input", "input.txt", "--letters", "ab"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Letter counts"))
        .stdout(predicate::str::contains("Total wall clock"));
}

#[test]
fn test_ips_count_from_env() {
    let dir = TempDir::new().unwrap();
    let output = pipework(&dir)
        .env("PIPEWORK_IPS__COUNT", "7")
        .args(["--format", "json", "ips"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let stages = report["stages"].as_array().unwrap();
    assert_eq!(stages.len(), 3);
    assert_eq!(stages[0]["name"], "generator");
    assert_eq!(stages[0]["forwarded"], 7);
    assert_eq!(stages[1]["received"], 7);
    assert_eq!(
        stages[1]["forwarded"].as_u64().unwrap(),
        report["items"].as_array().unwrap().len() as u64
    );
}

#[test]
fn test_grades_lock_mode_writes_averages() {
    let dir = TempDir::new().unwrap();
    pipework(&dir)
        .args(["grades", "--mode", "lock", "--students", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("maximum"));

    let averages = fs::read_to_string(dir.path().join("medias.txt")).unwrap();
    assert_eq!(averages.lines().count(), 4);
    for i in 1..=4 {
        assert!(dir.path().join(format!("Alumno{i}.txt")).exists());
    }
}

#[test]
fn test_grades_pool_mode_uses_directory_flag() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("work")).unwrap();
    pipework(&dir)
        .args(["-C", "work", "grades", "--mode", "pool", "--pool-size", "2", "--students", "5"])
        .assert()
        .success();

    let averages = fs::read_to_string(dir.path().join("work/medias.txt")).unwrap();
    let names: Vec<&str> = averages
        .lines()
        .map(|l| l.split_whitespace().nth(1).unwrap())
        .collect();
    assert_eq!(names, vec!["Alumno1", "Alumno2", "Alumno3", "Alumno4", "Alumno5"]);
}

#[test]
fn test_movies_filters_by_year() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("movies.txt"),
        "Heat;1995\nToy Story;1995\nFargo;1996\n",
    )
    .unwrap();

    pipework(&dir)
        .args(["movies", "--year", "1995", "--input", "movies.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("peliculas1995.txt"));

    let written = fs::read_to_string(dir.path().join("peliculas1995.txt")).unwrap();
    assert_eq!(written, "Heat;1995\nToy Story;1995\n");
}

#[test]
fn test_movies_rejects_future_year() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("movies.txt"), "Heat;1995\n").unwrap();
    pipework(&dir)
        .args(["movies", "--year", "9999", "--input", "movies.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Year must be before"));
}

#[test]
fn test_movies_missing_input() {
    let dir = TempDir::new().unwrap();
    pipework(&dir)
        .args(["movies", "--year", "1995", "--input", "nope.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_config_show_merges_repo_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("pipework.toml"), "[ips]\ncount = 99\n").unwrap();
    pipework(&dir)
        .args(["config", "show", "ips"])
        .assert()
        .success()
        .stdout(predicate::str::contains("99"));
}

#[test]
fn test_config_validate_rejects_bad_percentage() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bad.toml"), "[pool]\nthread_percentage = 150\n").unwrap();
    pipework(&dir)
        .args(["--config", "bad.toml", "config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("thread_percentage"));
}

#[test]
fn test_config_show_as_toml() {
    let dir = TempDir::new().unwrap();
    pipework(&dir)
        .args(["config", "show", "grades", "--toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("averages_file = \"medias.txt\""));
}
