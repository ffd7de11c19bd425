//! Integration tests for Scriptor
//!
//! The container launcher is replaced by a shell script through
//! `SCRIPTOR_DOCKER_CMD`, so no docker daemon is needed.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CHAINABLE: &str = r#"{"msg":"scripts.run.cleanup","chainable":true}"#;
const NOT_CHAINABLE: &str = r#"{"msg":"scripts.run.cleanup","chainable":false}"#;

/// Helper to create a scriptor Command isolated from the caller's environment
fn scriptor(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("scriptor");
    cmd.current_dir(dir.path())
        .env_remove("SCRIPTOR_DOCKER_CMD")
        .env_remove("SCRIPTOR_IMAGE")
        .env_remove("SCRIPTOR_IMAGE_TAG")
        .env_remove("RUST_LOG");
    cmd
}

/// Write an executable launcher stand-in into `dir`
#[cfg(unix)]
fn fake_docker(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-docker.sh");
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_scriptor_help() {
        let dir = TempDir::new().unwrap();
        scriptor(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--output-directory"))
            .stdout(predicate::str::contains("--chain"));
    }

    #[test]
    fn test_scriptor_version() {
        let dir = TempDir::new().unwrap();
        scriptor(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_output_directory_is_required() {
        let dir = TempDir::new().unwrap();
        scriptor(&dir)
            .assert()
            .failure()
            .stderr(predicate::str::contains("--output-directory"));
    }
}

// =============================================================================
// Configuration and Precondition Errors
// =============================================================================

mod preconditions {
    use super::*;

    #[test]
    fn test_invalid_replay_mode_names_flag() {
        let dir = TempDir::new().unwrap();
        scriptor(&dir)
            .args(["--output-directory", "out", "--replay", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--replay"));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_invalid_unrandomize_mode_names_flag() {
        let dir = TempDir::new().unwrap();
        scriptor(&dir)
            .args(["-o", "out", "--unrandomize", "sometimes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--unrandomize"));
    }

    #[test]
    fn test_invalid_show_browser_json() {
        let dir = TempDir::new().unwrap();
        scriptor(&dir)
            .args(["-o", "out", "--show-browser", "{not json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--show-browser"));
    }

    #[test]
    fn test_missing_script_directory() {
        let dir = TempDir::new().unwrap();
        scriptor(&dir)
            .args(["-o", "out", "-s", "no-such-dir"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("does not exist"));
    }

    #[test]
    fn test_missing_warc_input() {
        let dir = TempDir::new().unwrap();
        scriptor(&dir)
            .args(["-o", "out", "-w", "missing.warc.gz"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("WARC input"));
    }

    #[test]
    fn test_invalid_inline_input() {
        let dir = TempDir::new().unwrap();
        scriptor(&dir)
            .args(["-o", "out", "-i", "{\"url\": "])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--input"));
    }

    #[test]
    fn test_non_empty_output_directory_fails() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("out")).unwrap();
        fs::write(dir.path().join("out/previous.txt"), "x").unwrap();

        scriptor(&dir)
            .args(["-o", "out"])
            .env("SCRIPTOR_DOCKER_CMD", "/nonexistent/docker")
            .assert()
            .failure()
            .stderr(predicate::str::contains("not empty"));
        assert!(dir.path().join("out/previous.txt").exists());
    }
}

// =============================================================================
// Runs With A Fake Launcher
// =============================================================================

#[cfg(unix)]
mod runs {
    use super::*;

    #[test]
    fn test_single_run_writes_log_and_passes_args() {
        let dir = TempDir::new().unwrap();
        let args_file = dir.path().join("args.txt");
        let launcher = fake_docker(
            dir.path(),
            &format!(
                "printf '%s\\n' \"$@\" > '{}'\necho 'hello from the container'\necho '{}'",
                args_file.display(),
                CHAINABLE
            ),
        );

        scriptor(&dir)
            .args(["-o", "out", "-d", "1.2", "--replay", "--no-har"])
            .env("SCRIPTOR_DOCKER_CMD", &launcher)
            .assert()
            .success()
            .stdout(predicate::str::contains("hello from the container"));

        let log = fs::read_to_string(dir.path().join("out/logs/scriptor.log")).unwrap();
        assert!(log.contains("hello from the container"));
        assert!(log.contains("scripts.run.cleanup"));

        let args = fs::read_to_string(&args_file).unwrap();
        let args: Vec<&str> = args.lines().collect();
        assert_eq!(&args[..4], &["run", "--interactive", "--init", "--rm"]);
        assert!(args.contains(&"scriptor_fitlayout:1.2"));
        assert!(args.iter().any(|a| a.ends_with(":/output")));
        assert!(args.windows(2).any(|w| w == ["--replay", "r"]));
        assert!(args.contains(&"--no-har"));
        assert!(!dir.path().join("out/chain.json").exists());
    }

    #[test]
    fn test_failed_run_still_exits_successfully() {
        let dir = TempDir::new().unwrap();
        let launcher = fake_docker(dir.path(), "echo 'boom'\nexit 3");

        scriptor(&dir)
            .args(["-o", "out"])
            .env("SCRIPTOR_DOCKER_CMD", &launcher)
            .assert()
            .success();
        assert!(dir.path().join("out/logs/scriptor.log").exists());
    }

    #[test]
    fn test_inline_input_is_mounted_read_only() {
        let dir = TempDir::new().unwrap();
        let args_file = dir.path().join("args.txt");
        let launcher = fake_docker(
            dir.path(),
            &format!("printf '%s\\n' \"$@\" > '{}'", args_file.display()),
        );

        scriptor(&dir)
            .args(["-o", "out", "-i", r#"{"url":"https://example.org"}"#])
            .env("SCRIPTOR_DOCKER_CMD", &launcher)
            .assert()
            .success();

        let args = fs::read_to_string(&args_file).unwrap();
        let input_mount = args
            .lines()
            .find(|a| a.ends_with(":/input:ro"))
            .expect("input mount");
        let input_dir = input_mount.trim_end_matches(":/input:ro");
        let config = fs::read_to_string(Path::new(input_dir).join("config.json")).unwrap();
        assert!(config.contains("example.org"));
    }

    #[test]
    fn test_chain_runs_until_not_chainable() {
        let dir = TempDir::new().unwrap();
        let counter = dir.path().join("count");
        let launcher = fake_docker(
            dir.path(),
            &format!(
                "n=$(cat '{counter}' 2>/dev/null || echo 0)\n\
                 n=$((n + 1))\n\
                 echo $n > '{counter}'\n\
                 if [ \"$n\" -lt 3 ]; then echo '{yes}'; else echo '{no}'; fi",
                counter = counter.display(),
                yes = CHAINABLE,
                no = NOT_CHAINABLE
            ),
        );

        scriptor(&dir)
            .args(["-o", "out", "--chain", "crawl"])
            .env("SCRIPTOR_DOCKER_CMD", &launcher)
            .assert()
            .success();

        let out = dir.path().join("out");
        for n in 1..=3 {
            assert!(out.join(format!("crawl-{}/logs/scriptor.log", n)).exists());
        }
        assert!(!out.join("crawl-4").exists());

        let state: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("crawl.json")).unwrap()).unwrap();
        assert_eq!(state["next_run"], 3);
        assert!(
            state["last_output_directory"]
                .as_str()
                .unwrap()
                .ends_with("crawl-2")
        );
    }
}
