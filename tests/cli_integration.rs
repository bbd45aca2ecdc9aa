//! CLI integration tests for gambit-gnm.
//!
//! These tests run the binary on small games written to a temporary
//! directory and check the printed equilibria.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PENNIES: &str = r#"NFG 1 R "Matching pennies" { "Player 1" "Player 2" } { 2 2 }

1 -1 -1 1 -1 1 1 -1
"#;

const PD: &str = r#"NFG 1 R "Prisoner's dilemma" { "Row" "Col" }

{ { "Cooperate" "Defect" }
{ "Cooperate" "Defect" }
}
""

{
{ "" 3, 3 }
{ "" 5, 0 }
{ "" 0, 5 }
{ "" 1, 1 }
}
1 2 3 4
"#;

/// Get the gambit-gnm binary command.
fn gnm() -> Command {
    Command::cargo_bin("gambit-gnm").unwrap()
}

/// Create a temporary directory for test games.
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn write_game(tmp: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = tmp.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

// ============================================================================
// solving
// ============================================================================

#[test]
fn test_matching_pennies_from_file() {
    let tmp = temp_dir();
    let game = write_game(&tmp, "pennies.nfg", PENNIES);

    gnm()
        .args(["-s", "1", "-q"])
        .arg(&game)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "NE,0.500000,0.500000,0.500000,0.500000",
        ));
}

#[test]
fn test_prisoners_dilemma_from_stdin() {
    let tmp = temp_dir();

    gnm()
        .args(["-q", "-s", "3"])
        .write_stdin(PD)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::diff(
            "NE,0.000000,1.000000,0.000000,1.000000\n",
        ));
}

#[test]
fn test_decimals_option() {
    let tmp = temp_dir();
    let game = write_game(&tmp, "pd.nfg", PD);

    gnm()
        .args(["-q", "-s", "3", "-d", "2"])
        .arg(&game)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::diff("NE,0.00,1.00,0.00,1.00\n"));
}

#[test]
fn test_one_line_per_perturbation() {
    let tmp = temp_dir();
    let game = write_game(&tmp, "pd.nfg", PD);

    let output = gnm()
        .args(["-q", "-s", "5", "-n", "3"])
        .arg(&game)
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().filter(|l| l.starts_with("NE,")).count(), 3);
}

#[test]
fn test_perturbation_file() {
    let tmp = temp_dir();
    let game = write_game(&tmp, "pennies.nfg", PENNIES);
    let perts = write_game(&tmp, "perts.csv", "0.7,0.3,0.2,0.8\n\n1/3, 2/3, 1, 0\n");

    let output = gnm()
        .arg("-q")
        .arg("-p")
        .arg(&perts)
        .arg(&game)
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    for line in lines {
        assert_eq!(line, "NE,0.500000,0.500000,0.500000,0.500000");
    }
}

#[test]
fn test_round_number_perturbation() {
    let tmp = temp_dir();
    let game = write_game(&tmp, "pennies.nfg", PENNIES);
    let perts = write_game(&tmp, "perts.csv", "0.3,0.1,0.2,0.4\n");

    gnm()
        .arg("-q")
        .arg("-p")
        .arg(&perts)
        .arg(&game)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::diff(
            "NE,0.500000,0.500000,0.500000,0.500000\n",
        ));
}

#[test]
fn test_banner_goes_to_stderr() {
    let tmp = temp_dir();
    let game = write_game(&tmp, "pd.nfg", PD);

    gnm()
        .args(["-s", "3"])
        .arg(&game)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Global Newton Method"))
        .stdout(predicate::str::starts_with("NE,"));
}

// ============================================================================
// configuration
// ============================================================================

#[test]
fn test_config_file() {
    let tmp = temp_dir();
    let game = write_game(&tmp, "pd.nfg", PD);
    let config = write_game(&tmp, "solver.toml", "[gnm]\nsteps = 50\nthreshold = 0.001\n");

    gnm()
        .args(["-q", "-s", "3", "-c"])
        .arg(&config)
        .arg(&game)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("NE,0.000000,1.000000"));
}

#[test]
fn test_invalid_config_fails() {
    let tmp = temp_dir();
    let game = write_game(&tmp, "pd.nfg", PD);
    let config = write_game(&tmp, "bad.toml", "[gnm]\nsteps = 0\n");

    gnm()
        .args(["-q", "-c"])
        .arg(&config)
        .arg(&game)
        .current_dir(tmp.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("steps must be positive"));
}

#[test]
fn test_default_config_in_working_directory() {
    let tmp = temp_dir();
    let game = write_game(&tmp, "pd.nfg", PD);
    write_game(&tmp, "gambit.toml", "[gnm]\nlnm_max = 20\n");

    gnm()
        .args(["-q", "-s", "3"])
        .arg(&game)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("NE,"));
}

// ============================================================================
// errors
// ============================================================================

#[test]
fn test_missing_file() {
    let tmp = temp_dir();

    gnm()
        .args(["-q", "nope.nfg"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("error: failed to read game from"));
}

#[test]
fn test_parse_error_reports_line() {
    let tmp = temp_dir();
    let game = write_game(
        &tmp,
        "short.nfg",
        "NFG 1 R \"t\" { \"a\" \"b\" } { 2 2 }\n\n1 2 3\n",
    );

    gnm()
        .arg("-q")
        .arg(&game)
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 3"));
}

#[test]
fn test_wrong_perturbation_length() {
    let tmp = temp_dir();
    let game = write_game(&tmp, "pennies.nfg", PENNIES);
    let perts = write_game(&tmp, "perts.csv", "0.5,0.5\n");

    gnm()
        .arg("-q")
        .arg("-p")
        .arg(&perts)
        .arg(&game)
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("perts.csv:1"));
}

#[test]
fn test_zero_count_rejected() {
    let tmp = temp_dir();
    let game = write_game(&tmp, "pd.nfg", PD);

    gnm()
        .args(["-n", "0"])
        .arg(&game)
        .current_dir(tmp.path())
        .assert()
        .failure();
}

#[test]
fn test_oversized_game_rejected() {
    let tmp = temp_dir();
    let game = write_game(
        &tmp,
        "huge.nfg",
        "NFG 1 R \"\" { \"a\" \"b\" \"c\" \"d\" } { 65536 65536 65536 65536 }\n",
    );

    gnm()
        .arg("-q")
        .arg(&game)
        .current_dir(tmp.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("payoff table size overflows"));
}
