//! Integration tests for the xh-fetch command-line interface

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::path::Path;
use std::process::Output;
use tempfile::TempDir;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Temp dir with a cookie export and no config file
fn setup_env() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("cookies.json"),
        r#"{"auth_token": "abc", "ct0": "csrf123", "g_state": "{\"i_l\":0}"}"#,
    )
    .unwrap();
    temp_dir
}

fn xh_fetch(temp_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("xh-fetch").unwrap();
    cmd.env("XHARVEST_CONFIG", temp_dir.join("missing-config.toml"))
        .env_remove("XHARVEST_API_BASE_URL")
        .arg("--cookie-file")
        .arg(temp_dir.join("cookies.json"))
        .arg("--store-path")
        .arg(temp_dir.join("accounts.toml"))
        .args(["--retry-count", "1", "--retry-delay", "0", "--rate-limit-delay", "0"]);
    cmd
}

/// Run the binary off the async runtime so the mock server keeps serving
async fn run_blocking(mut cmd: Command) -> Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn timeline(posts: &[(u64, &str, &str)]) -> Value {
    let entries: Vec<Value> = posts
        .iter()
        .map(|(id, text, created_at)| {
            json!({
                "entryId": format!("tweet-{}", id),
                "content": {"itemContent": {"tweet_results": {"result": {
                    "__typename": "Tweet",
                    "rest_id": id.to_string(),
                    "legacy": {
                        "id_str": id.to_string(),
                        "full_text": text,
                        "created_at": created_at,
                        "user_id_str": "42"
                    }
                }}}}
            })
        })
        .collect();

    json!({"data": {"user": {"result": {"timeline_v2": {"timeline": {"instructions": [
        {"type": "TimelineAddEntries", "entries": entries}
    ]}}}}}})
}

fn daily_posts() -> Value {
    timeline(&[
        (5, "fifth, with a comma", "Tue Mar 05 12:00:00 +0000 2024"),
        (4, "fourth", "Mon Mar 04 12:00:00 +0000 2024"),
        (3, "third", "Sun Mar 03 12:00:00 +0000 2024"),
        (2, "second", "Sat Mar 02 12:00:00 +0000 2024"),
        (1, "first", "Fri Mar 01 12:00:00 +0000 2024"),
    ])
}

async fn mount_timeline(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path_regex(r"/UserTweets$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[test]
fn test_help_lists_options() {
    Command::cargo_bin("xh-fetch")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--from-date"))
        .stdout(predicate::str::contains("--start"))
        .stdout(predicate::str::contains("--json"))
        .stdout(predicate::str::contains("--csv"))
        .stdout(predicate::str::contains("EXIT CODES"));
}

#[test]
fn test_version() {
    Command::cargo_bin("xh-fetch")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("xh-fetch"));
}

#[test]
fn test_account_required() {
    Command::cargo_bin("xh-fetch")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("ACCOUNT"));
}

#[test]
fn test_date_range_conflicts_with_start() {
    Command::cargo_bin("xh-fetch")
        .unwrap()
        .args([
            "rustlang",
            "--start",
            "2024-03-01T00:00:00Z",
            "--from-date",
            "2024-03-01",
            "--to-date",
            "2024-03-02",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_from_date_requires_to_date() {
    Command::cargo_bin("xh-fetch")
        .unwrap()
        .args(["rustlang", "--from-date", "2024-03-01"])
        .assert()
        .failure();
}

#[test]
fn test_invalid_timestamp_exit_code() {
    let temp_dir = setup_env();
    xh_fetch(temp_dir.path())
        .args(["rustlang", "--start", "2024-03-01 00:00:00"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid timestamp"));
}

#[test]
fn test_invalid_account_exit_code() {
    let temp_dir = setup_env();
    xh_fetch(temp_dir.path())
        .arg("@")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid account handle"));
}

#[test]
fn test_missing_cookie_file_is_session_error() {
    let temp_dir = TempDir::new().unwrap();
    xh_fetch(temp_dir.path())
        .arg("42")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to read cookie file"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_date_range_export_to_json_and_csv() {
    let server = MockServer::start().await;
    mount_timeline(&server, daily_posts()).await;

    let temp_dir = setup_env();
    let json_path = temp_dir.path().join("out").join("tweets.json");
    let csv_path = temp_dir.path().join("out").join("tweets.csv");

    let mut cmd = xh_fetch(temp_dir.path());
    cmd.env("XHARVEST_API_BASE_URL", server.uri())
        .args(["42", "--from-date", "2024-03-03", "--to-date", "2024-03-05", "-n", "10"])
        .arg("--json")
        .arg(&json_path)
        .arg("--csv")
        .arg(&csv_path);

    let output = run_blocking(cmd).await;
    output.assert().success().stdout(predicate::str::is_empty());

    let records: Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    let ids: Vec<&str> = records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["tweet_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["5", "4", "3"]);
    assert_eq!(records[0]["date"], "2024-03-05T12:00:00+00:00");
    assert_eq!(records[0]["time"], "2024-03-05 12:00:00 UTC");
    assert_eq!(records[0]["user_identifier"], 42);

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert!(csv.starts_with("tweet_id,text,date,time,user_identifier\n"));
    assert!(csv.contains("5,\"fifth, with a comma\",2024-03-05T12:00:00+00:00"));

    // The session pool was registered with the filtered cookies
    let pool = std::fs::read_to_string(temp_dir.path().join("accounts.toml")).unwrap();
    assert!(pool.contains("auth_token=abc; ct0=csrf123"));
    assert!(!pool.contains("g_state"));

    // Requests carried the CSRF token taken from ct0
    let requests = server.received_requests().await.unwrap();
    assert!(!requests.is_empty());
    assert_eq!(
        requests[0].headers.get("x-csrf-token").unwrap().to_str().unwrap(),
        "csrf123"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_preview_printed_without_exports() {
    let server = MockServer::start().await;
    mount_timeline(&server, daily_posts()).await;
    Mock::given(method("GET"))
        .and(path_regex(r"/UserByScreenName$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"user": {"result": {
                "__typename": "User",
                "rest_id": "42",
                "legacy": {"screen_name": "rustlang", "name": "Rust"}
            }}}
        })))
        .mount(&server)
        .await;

    let temp_dir = setup_env();
    let mut cmd = xh_fetch(temp_dir.path());
    cmd.env("XHARVEST_API_BASE_URL", server.uri())
        .args(["@rustlang", "--start", "2024-03-04T00:00:00Z"]);

    let output = run_blocking(cmd).await;
    output
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "1. [2024-03-05 12:00:00 UTC] ID: 5 | fifth, with a comma",
        ))
        .stdout(predicate::str::contains("2. [2024-03-04 12:00:00 UTC] ID: 4 | fourth"))
        .stdout(predicate::str::contains("third").not());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_auth_failure_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/UserTweets$"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Could not authenticate you"))
        .mount(&server)
        .await;

    let temp_dir = setup_env();
    let mut cmd = xh_fetch(temp_dir.path());
    cmd.env("XHARVEST_API_BASE_URL", server.uri()).arg("42");

    let output = run_blocking(cmd).await;
    output
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Authentication failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_batch_with_every_account_failing_exits_one() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/UserTweets$"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let temp_dir = setup_env();
    let mut cmd = xh_fetch(temp_dir.path());
    cmd.env("XHARVEST_API_BASE_URL", server.uri())
        .args(["41", "42", "--no-preview"]);

    let output = run_blocking(cmd).await;
    output
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed: 41"))
        .stderr(predicate::str::contains("Failed: 42"));
}
