//! CLI integration tests for conexia
//!
//! Tests the conexia CLI commands end-to-end using assert_cmd. None of these
//! commands reach the backend.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command isolated from the caller's environment and config directory
#[allow(deprecated)]
fn conexia_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("conexia").unwrap();
    cmd.current_dir(config_dir.path())
        .env("CONEXIA_CONFIG_DIR", config_dir.path())
        .env("RUST_LOG", "off")
        .env_remove("CONEXIA_COMPANY")
        .env_remove("CONEXIA_API_KEY")
        .env_remove("SUPABASE_ANON_KEY");
    cmd
}

#[test]
fn test_config_list_shows_defaults() {
    let dir = TempDir::new().unwrap();

    conexia_cmd(&dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tables.projects = conex_projetos"))
        .stdout(predicate::str::contains("ui.view_mode_key = projetosViewType"))
        .stdout(predicate::str::contains("(not set"));
}

#[test]
fn test_config_set_persists() {
    let dir = TempDir::new().unwrap();

    conexia_cmd(&dir)
        .args(["config", "set", "gateway.url", "https://abc.supabase.co/"])
        .assert()
        .success();

    conexia_cmd(&dir)
        .args(["config", "get", "gateway.url"])
        .assert()
        .success()
        .stdout(predicate::str::diff("https://abc.supabase.co\n"));

    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_config_rejects_stored_api_key() {
    let dir = TempDir::new().unwrap();

    conexia_cmd(&dir)
        .args(["config", "set", "gateway.api_key", "secret"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("environment variable"));
}

#[test]
fn test_view_mode_roundtrip() {
    let dir = TempDir::new().unwrap();

    conexia_cmd(&dir)
        .args(["view", "get"])
        .assert()
        .success()
        .stdout(predicate::str::diff("grid\n"));

    conexia_cmd(&dir)
        .args(["view", "set", "table"])
        .assert()
        .success()
        .stdout(predicate::str::contains("View mode set to table"));

    conexia_cmd(&dir)
        .args(["view", "get"])
        .assert()
        .success()
        .stdout(predicate::str::diff("table\n"));

    let stored = std::fs::read_to_string(dir.path().join("preferences.toml")).unwrap();
    assert!(stored.contains("projetosViewType"));
}

#[test]
fn test_corrupt_view_mode_falls_back_to_grid() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("preferences.toml"),
        "projetosViewType = \"carousel\"\n",
    )
    .unwrap();

    conexia_cmd(&dir)
        .args(["view", "get", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"view_mode\": \"grid\""));
}

#[test]
fn test_add_without_company_fails_before_any_request() {
    let dir = TempDir::new().unwrap();

    // Unroutable gateway: reaching the network would fail differently
    conexia_cmd(&dir)
        .args(["config", "set", "gateway.url", "http://127.0.0.1:9"])
        .assert()
        .success();

    conexia_cmd(&dir)
        .args(["projects", "add", "Launch"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E001"))
        .stderr(predicate::str::contains("No company identity"))
        .stderr(predicate::str::contains("--company"));
}

#[test]
fn test_delete_requires_force() {
    let dir = TempDir::new().unwrap();

    conexia_cmd(&dir)
        .args(["projects", "delete", "p1", "--company", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Use --force"));
}

#[test]
fn test_menu_lists_fixed_entries() {
    let dir = TempDir::new().unwrap();

    conexia_cmd(&dir)
        .args(["menu", "--active", "projetos"])
        .assert()
        .success()
        .stdout(predicate::str::contains("> Projetos"))
        .stdout(predicate::str::contains("/projetos"))
        .stdout(predicate::str::contains("Estatísticas"))
        .stdout(predicate::str::contains("(disabled)"));
}

#[test]
fn test_menu_rejects_unknown_screen() {
    let dir = TempDir::new().unwrap();

    conexia_cmd(&dir)
        .args(["menu", "--active", "settings"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown screen"));
}
