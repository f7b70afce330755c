//! Integration tests for the studio CLI.
//!
//! Every test works on its own temporary state directory.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a studio Command bound to `dir`
fn studio(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("studio");
    cmd.arg("--state-dir").arg(dir.path());
    cmd.env_remove("STUDIO_PORT")
        .env_remove("STUDIO_HOST")
        .env_remove("STUDIO_MAX_CONCURRENT_TRAINING")
        .env_remove("STUDIO_TRAINING_TIMEOUT_SECS")
        .env_remove("STUDIO_SCRAPER_ENDPOINT");
    cmd
}

fn state_dir() -> TempDir {
    TempDir::new().unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_studio_help() {
        cargo_bin_cmd!("studio")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("serve"))
            .stdout(predicate::str::contains("cancel"));
    }

    #[test]
    fn test_studio_version() {
        cargo_bin_cmd!("studio").arg("--version").assert().success();
    }

    #[test]
    fn test_status_lists_catalog() {
        let dir = state_dir();
        studio(&dir)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("spotify"))
            .stdout(predicate::str::contains("wuthering-waves"))
            .stdout(predicate::str::contains("In flight: 0"));
    }
}

// =============================================================================
// Job Commands
// =============================================================================

mod jobs {
    use super::*;

    #[test]
    fn test_progress_defaults_to_ready() {
        let dir = state_dir();
        studio(&dir)
            .args(["progress", "spotify"])
            .assert()
            .success()
            .stdout(predicate::str::contains("spotify: 0.0% - Siap untuk training"));

        studio(&dir)
            .arg("progress")
            .assert()
            .success()
            .stdout(predicate::str::contains("global: 0.0%"));
    }

    #[test]
    fn test_progress_reads_record() {
        let dir = state_dir();
        fs::write(
            dir.path().join("progress_amazon.json"),
            r#"{"percent": 45.0, "description": "Training model 4 topik (3/9)...", "timestamp": "2024-01-01T10:00:00Z", "app_name": "amazon"}"#,
        )
        .unwrap();

        studio(&dir)
            .args(["progress", "amazon"])
            .assert()
            .success()
            .stdout(predicate::str::contains("amazon: 45.0% - Training model 4 topik"));
    }

    #[test]
    fn test_progress_rejects_invalid_app() {
        let dir = state_dir();
        studio(&dir)
            .args(["progress", "../etc"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid app id"));
    }

    #[test]
    fn test_cancel_creates_flag() {
        let dir = state_dir();
        studio(&dir)
            .args(["cancel", "spotify"])
            .assert()
            .success()
            .stdout(predicate::str::contains("spotify"));
        assert!(dir.path().join("cancel_spotify.flag").exists());
    }

    #[test]
    fn test_global_cancel_marks_unfinished_runs() {
        let dir = state_dir();
        fs::write(
            dir.path().join("progress_amazon.json"),
            r#"{"percent": 30.0, "description": "Training LDA", "timestamp": "2024-01-01T10:00:00Z"}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("progress_spotify.json"),
            r#"{"percent": 100.0, "description": "selesai", "timestamp": "2024-01-01T10:00:00Z"}"#,
        )
        .unwrap();

        studio(&dir)
            .arg("cancel")
            .assert()
            .success()
            .stdout(predicate::str::contains("amazon"));
        assert!(!dir.path().join("cancel.flag").exists());
        assert!(dir.path().join("cancel_amazon.flag").exists());
        assert!(!dir.path().join("cancel_spotify.flag").exists());
    }

    #[test]
    fn test_global_cancel_without_runs() {
        let dir = state_dir();
        studio(&dir)
            .arg("cancel")
            .assert()
            .success()
            .stdout(predicate::str::contains("No unfinished runs found."));
        assert!(!dir.path().join("cancel.flag").exists());
    }

    #[test]
    fn test_purge_twice() {
        let dir = state_dir();
        fs::create_dir_all(dir.path().join("models")).unwrap();
        fs::write(dir.path().join("models/spotify_lda.json"), "{}").unwrap();
        fs::write(dir.path().join("progress_spotify.json"), "{}").unwrap();

        studio(&dir)
            .args(["purge", "spotify"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Deleted 2 file(s)"));
        assert!(!dir.path().join("models/spotify_lda.json").exists());

        studio(&dir)
            .args(["purge", "spotify"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Nothing to delete"));
    }
}

// =============================================================================
// Config Tests
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = state_dir();
        studio(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using default configuration"))
            .stdout(predicate::str::contains("max_concurrent = 2"));
    }

    #[test]
    fn test_config_validate_no_config() {
        let dir = state_dir();
        studio(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using defaults (valid)"));
    }

    #[test]
    fn test_config_init_then_validate() {
        let dir = state_dir();
        studio(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created studio.toml"));
        assert!(dir.path().join("studio.toml").exists());

        studio(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid."));

        studio(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = state_dir();
        fs::write(
            dir.path().join("studio.toml"),
            "[training]\nmax_concurrent = 0\nmin_topics = 8\nmax_topics = 4\n",
        )
        .unwrap();

        studio(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings:"))
            .stdout(predicate::str::contains("max_concurrent is 0"))
            .stdout(predicate::str::contains("greater than max_topics"));
    }

    #[test]
    fn test_config_show_file_values() {
        let dir = state_dir();
        fs::write(dir.path().join("studio.toml"), "[server]\nport = 9100\n").unwrap();

        studio(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 9100"))
            .stdout(predicate::str::contains("bind = 127.0.0.1:9100"));
    }
}
