//! Integration tests for the `nipgus` CLI binary.
//!
//! Argument parsing, offline NIP commands, exit codes, and a registry
//! lookup against a mock session server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `nipgus` binary with env isolation.
///
/// Clears all `NIPGUS_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn nipgus_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("nipgus");
    cmd.env("HOME", "/tmp/nipgus-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/nipgus-cli-test-nonexistent")
        .env("XDG_DATA_HOME", "/tmp/nipgus-cli-test-nonexistent")
        .env_remove("NIPGUS_CONFIG")
        .env_remove("NIPGUS_STORAGE")
        .env_remove("NIPGUS_COMPANY")
        .env_remove("NIPGUS_OUTPUT")
        .env_remove("NIPGUS_AUTH_SECRET")
        .env_remove("NIPGUS_PANEL_PASSWORD");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Config pointing the session server at `server`, plus a store holding a
/// session token and a license key.
fn workspace(dir: &Path, server: &MockServer) -> (String, String) {
    let config = dir.join("config.toml");
    std::fs::write(
        &config,
        format!("[oauth]\nurl = \"{}\"\n", server.uri()),
    )
    .unwrap();

    let storage = dir.join("storage.json");
    std::fs::write(
        &storage,
        json!({
            "nip_gus_session_id": "tok-1",
            "nipGusLicenseKey": "ABCD-EFGH-IJKL-MNOP",
        })
        .to_string(),
    )
    .unwrap();

    (
        config.display().to_string(),
        storage.display().to_string(),
    )
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = nipgus_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    nipgus_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("GUS")
            .and(predicate::str::contains("nip"))
            .and(predicate::str::contains("company"))
            .and(predicate::str::contains("license")),
    );
}

#[test]
fn test_version_flag() {
    nipgus_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nipgus"));
}

#[test]
fn test_completions_zsh() {
    nipgus_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_invalid_output_format() {
    let output = nipgus_cmd()
        .args(["--output", "invalid", "nip", "clean", "1"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

// ── Offline NIP commands ────────────────────────────────────────────

#[test]
fn test_nip_validate_accepts_any_notation() {
    nipgus_cmd()
        .args(["--color", "never", "nip", "validate", "PL 526-000-12-46"])
        .assert()
        .success()
        .stdout(predicate::str::contains("526-000-12-46").and(predicate::str::contains("yes")));
}

#[test]
fn test_nip_validate_invalid_exits_with_usage_code() {
    let output = nipgus_cmd()
        .args(["--color", "never", "nip", "validate", "5260001246", "5260001247"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("5260001247"), "{text}");
}

#[test]
fn test_nip_validate_plain_output() {
    nipgus_cmd()
        .args(["-o", "plain", "nip", "validate", "7740001454"])
        .assert()
        .success()
        .stdout("7740001454\ttrue\n");
}

#[test]
fn test_nip_format_and_clean() {
    nipgus_cmd()
        .args(["nip", "format", "5260001246"])
        .assert()
        .success()
        .stdout("526-000-12-46\n");
    nipgus_cmd()
        .args(["nip", "format", "--partial", "52600"])
        .assert()
        .success()
        .stdout("526-00\n");
    nipgus_cmd()
        .args(["nip", "clean", "PL 526-000-12-46"])
        .assert()
        .success()
        .stdout("5260001246\n");
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    nipgus_cmd()
        .args(["--config", "/tmp/elsewhere/nipgus.toml", "config", "path"])
        .assert()
        .success()
        .stdout("/tmp/elsewhere/nipgus.toml\n");
}

#[test]
fn test_config_show_without_file_renders_defaults() {
    nipgus_cmd()
        .args(["-o", "json", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pipedrive-plugin"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_license_validate_requires_company() {
    let output = nipgus_cmd()
        .args(["license", "validate", "ABCD-EFGH-IJKL-MNOP"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--company"));
}

#[test]
fn test_license_validate_without_secret_is_auth_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = nipgus_cmd()
        .args(["--company", "acme", "--storage"])
        .arg(dir.path().join("storage.json"))
        .args(["license", "validate", "ABCD-EFGH-IJKL-MNOP"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("license auth secret"));
}

#[test]
fn test_session_login_without_token_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = nipgus_cmd()
        .arg("--storage")
        .arg(dir.path().join("storage.json"))
        .args([
            "session",
            "login",
            "https://acme.pipedrive.com/organization/7",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("nip_gus_session"));
}

#[test]
fn test_license_clear_needs_yes_when_not_interactive() {
    let output = nipgus_cmd().args(["license", "clear"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--yes"));
}

// ── Registry lookups ────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_company_lookup_prints_registry_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/gus/company-data"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "nip": "5260001246",
                "regon": "012345678",
                "nazwa": "Acme Sp. z o.o.",
                "statusNip": "Czynny",
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (config, storage) = workspace(dir.path(), &server);

    nipgus_cmd()
        .args(["--config", &config, "--storage", &storage])
        .args(["-o", "plain", "company", "lookup", "526-000-12-46"])
        .assert()
        .success()
        .stdout("Acme Sp. z o.o.\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_company_lookup_expired_session_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/gus/company-data"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (config, storage) = workspace(dir.path(), &server);

    let output = nipgus_cmd()
        .args(["--config", &config, "--storage", &storage])
        .args(["company", "lookup", "5260001246"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));

    // The rejected token is forgotten
    let stored = std::fs::read_to_string(&storage).unwrap();
    assert!(!stored.contains("tok-1"), "{stored}");
}
