//! CLI integration tests for the Kebele command-line interface.
//!
//! These tests need no network: the translator short-circuits when nothing
//! has to be sent to the model.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the kebele binary, isolated from the user's config.
fn kebele(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kebele").unwrap();
    cmd.env("KEBELE_CONFIG_DIR", config_dir)
        .env_remove("KEBELE_CONFIG")
        .env_remove("KEBELE_LLM_API_KEY");
    cmd
}

/// A config that needs no API keys.
fn write_offline_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("kebele.toml");
    std::fs::write(
        &path,
        r#"
[llm]
provider = "ollama"

[embedding]
provider = "mock"

[translation]
supported = ["en", "am"]
"#,
    )
    .unwrap();
    path
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    kebele(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Kebele"))
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("translate"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    kebele(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("kebele"));
}

#[test]
fn test_ask_requires_query() {
    let dir = TempDir::new().unwrap();
    kebele(dir.path()).arg("ask").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Translate Command
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_translate_into_source_language_is_unchanged() {
    let dir = TempDir::new().unwrap();
    let config = write_offline_config(dir.path());
    let doc = dir.path().join("notice.json");
    std::fs::write(&doc, r#"{"id": "n-1", "title": "Office hours"}"#).unwrap();

    kebele(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("--json")
        .arg("translate")
        .arg(&doc)
        .args(["--lang", "en"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""title":"Office hours""#));
}

#[test]
fn test_translate_rejects_unsupported_language() {
    let dir = TempDir::new().unwrap();
    let config = write_offline_config(dir.path());
    let doc = dir.path().join("notice.json");
    std::fs::write(&doc, r#"{"title": "Office hours"}"#).unwrap();

    kebele(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("translate")
        .arg(&doc)
        .args(["--lang", "fr"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("fr"));
}

#[test]
fn test_translate_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_offline_config(dir.path());

    kebele(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("translate")
        .arg(dir.path().join("missing.json"))
        .args(["--lang", "am"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.json"));
}
