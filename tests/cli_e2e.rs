//! End-to-end CLI tests for xcrawl.
//!
//! These tests run the actual xcrawl binary against a local mock of the
//! timeline endpoint and verify:
//! - Command-line interface behavior
//! - Output format and content
//! - Error handling and exit codes
//!
//! Every test runs with its own HOME/XDG directories so that a developer's
//! real config file and token never leak in.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use mockito::{Matcher, Server, ServerGuard};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

/// Log a test event with timestamp
macro_rules! test_log {
    ($($arg:tt)*) => {
        let timestamp = chrono::Utc::now().format("%H:%M:%S%.3f");
        eprintln!("[TEST {}] {}", timestamp, format!($($arg)*));
    };
}

const TIMELINE_PATH: &str = "/1.1/statuses/user_timeline.json";

const TIMELINE: &str = r#"[
    {"id": 30, "created_at": "Fri Mar 20 12:00:00 +0000 2020", "text": "RT @db: Ersatzverkehr",
     "lang": "de", "retweet_count": 4,
     "entities": {"hashtags": [], "user_mentions": [{"screen_name": "db"}]}},
    {"id": 20, "created_at": "Sun Mar 15 08:00:00 +0000 2020", "text": "Bauarbeiten #rail",
     "lang": "de", "retweet_count": 0,
     "entities": {"hashtags": [{"text": "rail"}], "user_mentions": []}},
    {"id": 10, "created_at": "Sun Mar 01 08:00:00 +0000 2020", "text": "too old",
     "lang": "en", "retweet_count": 0,
     "entities": {"hashtags": [], "user_mentions": []}}
]"#;

/// Isolated home directory plus an archive directory inside it.
struct Sandbox {
    home: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            home: TempDir::new().expect("Failed to create temp home"),
        }
    }

    fn archive_dir(&self) -> PathBuf {
        self.home.path().join("archives")
    }

    fn config_file(&self, content: &str) -> PathBuf {
        let path = self.home.path().join("xcrawl.toml");
        fs::write(&path, content).expect("Failed to write config");
        path
    }

    /// Command with a clean environment and no token.
    fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("xcrawl");
        cmd.env("HOME", self.home.path())
            .env("XDG_CONFIG_HOME", self.home.path().join(".config"))
            .env("XDG_DATA_HOME", self.home.path().join(".local/share"))
            .env("NO_COLOR", "1")
            .env("XCRAWL_ARCHIVE_DIR", self.archive_dir())
            .env_remove("XCRAWL_BEARER_TOKEN")
            .env_remove("XCRAWL_BASE_URL")
            .env_remove("XCRAWL_PAGE_SIZE")
            .env_remove("XCRAWL_LOG_FILE")
            .env_remove("XCRAWL_QUIET")
            .env_remove("XCRAWL_LOG_LEVEL")
            .env_remove("XCRAWL_LOG_FORMAT")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Command pointed at `server` with a token.
    fn online_cmd(&self, server: &ServerGuard) -> Command {
        let mut cmd = self.cmd();
        cmd.env("XCRAWL_BASE_URL", server.url())
            .env("XCRAWL_BEARER_TOKEN", "test-token");
        cmd
    }
}

fn timeline_server(body: &str, status: usize) -> ServerGuard {
    let mut server = Server::new();
    server
        .mock("GET", TIMELINE_PATH)
        .match_header("authorization", "Bearer test-token")
        .match_query(Matcher::Any)
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create();
    server
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .expect("Failed to read dir")
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// =============================================================================
// General CLI
// =============================================================================

#[test]
fn test_cli_help_lists_commands() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("crawl"))
        .stdout(predicate::str::contains("sheets"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_cli_version() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_completions() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("xcrawl"));
}

// =============================================================================
// Config
// =============================================================================

#[test]
fn test_config_show_masks_token() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .env("XCRAWL_BEARER_TOKEN", "super-secret")
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[feed]"))
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("super-secret").not());
}

#[test]
fn test_config_show_json() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .cmd()
        .args(["config", "--show", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["feed"]["page_size"], 200);
    assert_eq!(json["collector"]["on_empty_page"], "stop");
    assert_eq!(
        json["paths"]["archive_dir"],
        sandbox.archive_dir().display().to_string()
    );
}

#[test]
fn test_config_init_writes_default_file() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["config", "--init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let written = sandbox.home.path().join(".config/xcrawl/config.toml");
    let content = fs::read_to_string(written).unwrap();
    assert!(content.contains("[collector]"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["--config", "/definitely/not/here.toml", "config", "--show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("here.toml"));
}

#[test]
fn test_unknown_log_level_fails() {
    let sandbox = Sandbox::new();
    let config = sandbox.config_file("[output]\nlog_level = \"loud\"\n");
    sandbox
        .cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "--show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid log level: loud"));
}

#[test]
fn test_log_level_from_env_silences_info() {
    let sandbox = Sandbox::new();
    let server = timeline_server(TIMELINE, 200);
    let log = sandbox.home.path().join("log.txt");

    sandbox
        .online_cmd(&server)
        .env("XCRAWL_LOG_LEVEL", "warn")
        .arg("--log-file")
        .arg(&log)
        .args(["crawl", "@a", "-s", "2020-03-14", "-e", "2020-03-21", "-f", "json"])
        .assert()
        .success();

    let content = fs::read_to_string(&log).unwrap();
    assert!(!content.contains("Archive updated"));
}

// =============================================================================
// Crawl
// =============================================================================

#[test]
fn test_crawl_without_token_fails() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["crawl", "@a", "--start", "2020-03-14", "--end", "2020-03-21"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bearer token"));
    assert!(!sandbox.archive_dir().exists());
}

#[test]
fn test_crawl_without_accounts_fails() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .env("XCRAWL_BEARER_TOKEN", "t")
        .arg("crawl")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No accounts"));
}

#[test]
fn test_crawl_rejects_bad_date() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .env("XCRAWL_BEARER_TOKEN", "t")
        .args(["crawl", "@a", "--start", "2020-13-01", "--end", "2020-03-21"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--start"));
}

#[test]
fn test_crawl_rejects_unpairable_dates() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .env("XCRAWL_BEARER_TOKEN", "t")
        .args(["crawl", "@a", "@b", "@c"])
        .args(["--start", "2020-03-14", "--start", "2020-03-15"])
        .args(["--end", "2020-03-21", "--end", "2020-03-22"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("one start/end pair"));
}

#[test]
fn test_crawl_writes_archive() {
    let start = Instant::now();
    test_log!("Starting test_crawl_writes_archive");

    let sandbox = Sandbox::new();
    let server = timeline_server(TIMELINE, 200);

    let output = sandbox
        .online_cmd(&server)
        .args(["crawl", "@a", "--start", "2020-03-14", "--end", "2020-03-21", "-f", "json"])
        .output()
        .unwrap();
    test_log!("crawl stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["total_posts"], 2);
    assert_eq!(json["accounts"][0]["account"], "@a");
    assert_eq!(json["accounts"][0]["posts"], 2);
    assert_eq!(json["failed"].as_array().unwrap().len(), 0);
    assert_eq!(file_names(&sandbox.archive_dir()), ["a.xlsx"]);

    let output = sandbox
        .cmd()
        .args(["sheets", "@a", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let sheets = stdout_json(&output);
    assert_eq!(sheets["sheets"][0]["name"], "main_sheet");
    assert_eq!(sheets["sheets"][0]["rows"], 2);
    assert!(
        sheets["sheets"][1]["name"]
            .as_str()
            .unwrap()
            .starts_with("2020-03-14_to_2020-03-21_")
    );

    test_log!("Completed in {:?}", start.elapsed());
}

#[test]
fn test_crawl_twice_keeps_main_sheet_stable() {
    let sandbox = Sandbox::new();
    let server = timeline_server(TIMELINE, 200);

    for _ in 0..2 {
        sandbox
            .online_cmd(&server)
            .args(["crawl", "@a", "-s", "2020-03-14", "-e", "2020-03-21", "-q"])
            .assert()
            .success();
    }

    let output = sandbox
        .cmd()
        .args(["sheets", "a", "-f", "json"])
        .output()
        .unwrap();
    let sheets = stdout_json(&output);
    let list = sheets["sheets"].as_array().unwrap();
    assert_eq!(list.len(), 3);
    assert_eq!(list[0]["rows"], 2);
    assert_eq!(file_names(&sandbox.archive_dir()), ["a.xlsx"]);
}

#[test]
fn test_crawl_reports_api_error_and_exits_nonzero() {
    let sandbox = Sandbox::new();
    let server = timeline_server(
        r#"{"errors":[{"code":34,"message":"Sorry, that page does not exist."}]}"#,
        404,
    );

    let output = sandbox
        .online_cmd(&server)
        .args(["crawl", "@gone", "-s", "2020-03-14", "-e", "2020-03-21", "-f", "json"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["failed"][0]["account"], "@gone");
    assert_eq!(json["failed"][0]["kind"], "fetch");
    assert_eq!(json["failed"][0]["code"], 34);
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 of 1 account(s) failed"));
}

#[test]
fn test_crawl_uses_plan_from_config_file() {
    let sandbox = Sandbox::new();
    let server = timeline_server(TIMELINE, 200);
    let config = sandbox.config_file(
        r#"
[crawl]
accounts = ["@a", "@b"]
start_dates = [[2020, 3, 14]]
end_dates = [[2020, 3, 21]]
"#,
    );

    sandbox
        .online_cmd(&server)
        .arg("--config")
        .arg(&config)
        .arg("crawl")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 account(s) saved"));

    assert_eq!(file_names(&sandbox.archive_dir()), ["a.xlsx", "b.xlsx"]);
}

#[test]
fn test_crawl_log_file_receives_events() {
    let sandbox = Sandbox::new();
    let server = timeline_server(TIMELINE, 200);
    let log = sandbox.home.path().join("log.txt");

    sandbox
        .online_cmd(&server)
        .arg("--log-file")
        .arg(&log)
        .args(["crawl", "@a", "-s", "2020-03-14", "-e", "2020-03-21", "-f", "json"])
        .assert()
        .success();

    let content = fs::read_to_string(&log).unwrap();
    assert!(content.contains("Archive updated"));
}

// =============================================================================
// Sheets
// =============================================================================

#[test]
fn test_sheets_missing_archive_fails() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["sheets", "@nobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No archive for '@nobody'"));
}

#[test]
fn test_sheets_text_output() {
    let sandbox = Sandbox::new();
    let server = timeline_server(TIMELINE, 200);
    sandbox
        .online_cmd(&server)
        .args(["crawl", "@a", "-s", "2020-03-14", "-e", "2020-03-21", "-q"])
        .assert()
        .success();

    sandbox
        .cmd()
        .args(["sheets", "@a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a.xlsx"))
        .stdout(predicate::str::contains("main_sheet"));
}
