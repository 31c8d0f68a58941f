use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

const JIRA_VARS: &[&str] = &[
    "JIRA_URL",
    "JIRA_USER",
    "JIRA_TOKEN",
    "JIRA_PROJECT_CATEGORY",
    "JIRA_PAGE_SIZE",
    "JIRA_TIMEOUT_SECS",
    "JIRA_MIRROR_DB",
    "JIRA_MIRROR_CONFIG",
    "ENABLE_NOTIFY",
    "NOTIFY_WEBHOOK_URL",
    "RUST_LOG",
];

/// A `jmirror` command isolated from the caller's environment and home.
fn jmirror(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("jmirror").unwrap();
    for var in JIRA_VARS {
        cmd.env_remove(var);
    }
    cmd.env("HOME", home.path());
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_version_json() {
    let home = TempDir::new().unwrap();
    let output = jmirror(&home).args(["version", "--json"]).output().unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["name"], "jmirror");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_status_without_database() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("mirror.db");
    let output = jmirror(&home)
        .args(["status", "--json", "--db"])
        .arg(&db)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["initialized"], false);
    assert!(!db.exists());
}

#[test]
fn test_sync_without_credentials_is_config_error() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("mirror.db");
    let output = jmirror(&home)
        .args(["sync", "--json", "--db"])
        .arg(&db)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(7));
    let err: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["error"]["code"], "CONFIG_ERROR");
    assert!(err["error"]["message"].as_str().unwrap().contains("JIRA_TOKEN"));
}

#[test]
fn test_failed_sync_is_recorded() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("mirror.db");
    jmirror(&home)
        .args(["sync", "-q", "--db"])
        .arg(&db)
        .assert()
        .failure();

    let output = jmirror(&home)
        .args(["runs", "--json", "--db"])
        .arg(&db)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["count"], 1);
    assert_eq!(json["runs"][0]["status"], "failed");
    assert!(json["runs"][0]["error"].as_str().unwrap().contains("JIRA_URL"));
}

#[test]
fn test_unreadable_config_file() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("config.json");
    std::fs::write(&config, "{not json").unwrap();

    jmirror(&home)
        .args(["sync", "--config"])
        .arg(&config)
        .assert()
        .code(7);
}

#[test]
fn test_completions() {
    let home = TempDir::new().unwrap();
    let output = jmirror(&home).args(["completions", "bash"]).output().unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("jmirror"));
}
