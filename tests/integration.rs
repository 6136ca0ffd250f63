use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn vidx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("vidx");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let vault = root.join("vault");
    fs::create_dir_all(vault.join("notes")).unwrap();
    fs::create_dir_all(vault.join(".obsidian")).unwrap();
    fs::write(
        vault.join("alpha.md"),
        "# Alpha\n\nNotes about Rust programming with cargo and crates.",
    )
    .unwrap();
    fs::write(
        vault.join("beta.md"),
        "# Beta\n\nPython and machine learning. PyTorch training loops.",
    )
    .unwrap();
    fs::write(
        vault.join("notes").join("gamma.md"),
        "# Gamma\n\nDeployment notes: Kubernetes, Docker, and infrastructure.",
    )
    .unwrap();
    fs::write(vault.join("ignored.txt"), "not a markdown document").unwrap();
    fs::write(vault.join(".obsidian").join("workspace.md"), "editor state").unwrap();

    let config_content = format!(
        r#"[vault]
root = "{root}/vault"

[state]
dir = "{root}/state"

[embedding]
provider = "hash"
dims = 256
"#,
        root = root.display()
    );

    let config_path = config_dir.join("vidx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_vidx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = vidx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run vidx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn vault_of(config_path: &Path) -> PathBuf {
    config_path.parent().unwrap().parent().unwrap().join("vault")
}

#[test]
fn test_init_creates_store() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_vidx(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let state_dir = config_path.parent().unwrap().parent().unwrap().join("state");
    assert!(state_dir.join("vault_state.sqlite").exists());
    assert!(state_dir.join("sync_state.json").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_vidx(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_vidx(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_full_scan_counts_markdown_only() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_vidx(&config_path, &["index", "scan", "--full"]);
    assert!(success, "scan failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("added: 3"), "stdout={}", stdout);
    assert!(stdout.contains("modified: 0"));
}

#[test]
fn test_scan_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    run_vidx(&config_path, &["index", "scan", "--full"]);
    let (stdout, _, success) = run_vidx(&config_path, &["index", "scan", "--full"]);
    assert!(success);
    assert!(stdout.contains("added: 0"));
    assert!(stdout.contains("modified: 0"));
    assert!(stdout.contains("deleted: 0"));
}

#[test]
fn test_deleted_file_kept_as_history() {
    let (_tmp, config_path) = setup_test_env();

    run_vidx(&config_path, &["index", "scan", "--full"]);
    fs::remove_file(vault_of(&config_path).join("beta.md")).unwrap();

    let (stdout, _, success) = run_vidx(&config_path, &["index", "scan", "--full"]);
    assert!(success);
    assert!(stdout.contains("deleted: 1"));

    let (stdout, _, success) = run_vidx(&config_path, &["files", "--all"]);
    assert!(success);
    assert!(stdout.contains("deleted"));
    assert!(stdout.contains("beta.md"));

    let (stdout, _, success) = run_vidx(&config_path, &["files"]);
    assert!(success);
    assert!(!stdout.contains("beta.md"));
    assert!(stdout.contains("2 files"));
}

#[test]
fn test_build_then_up_to_date_then_force() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_vidx(&config_path, &["index", "build"]);
    assert!(success, "build failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("no previous build"));
    assert!(stdout.contains("documents: 3"));

    let (stdout, _, success) = run_vidx(&config_path, &["index", "build"]);
    assert!(success);
    assert!(stdout.contains("up to date"));

    let (stdout, _, success) = run_vidx(&config_path, &["index", "build", "--force"]);
    assert!(success);
    assert!(stdout.contains("forced rebuild"));
}

#[test]
fn test_search_after_build() {
    let (_tmp, config_path) = setup_test_env();

    run_vidx(&config_path, &["index", "build"]);
    let (stdout, stderr, success) = run_vidx(&config_path, &["search", "rust cargo crates"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.starts_with("1. alpha.md"), "stdout={}", stdout);
}

#[test]
fn test_search_auto_syncs_first() {
    let (_tmp, config_path) = setup_test_env();

    // No explicit scan or build: the first search triggers both.
    let (stdout, stderr, success) = run_vidx(&config_path, &["search", "kubernetes docker"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.starts_with("1. notes/gamma.md"), "stdout={}", stdout);
}

#[test]
fn test_search_without_index_when_auto_update_disabled() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success) = run_vidx(&config_path, &["config", "auto-update", "--disable"]);
    assert!(success);

    let (_, stderr, success) = run_vidx(&config_path, &["search", "rust"]);
    assert!(!success);
    assert!(stderr.contains("vidx index build"), "stderr={}", stderr);
}

#[test]
fn test_auto_update_interval_persists() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) =
        run_vidx(&config_path, &["config", "auto-update", "--interval", "5"]);
    assert!(success);
    assert!(stdout.contains("interval: 5 min"));

    let (stdout, _, success) = run_vidx(&config_path, &["config", "show"]);
    assert!(success);
    assert!(stdout.contains("5 min"));
    assert!(stdout.contains("provider:        hash"));
}

#[test]
fn test_auto_update_rejects_oversized_interval() {
    let (_tmp, config_path) = setup_test_env();

    let huge = u64::MAX.to_string();
    let (_, stderr, success) =
        run_vidx(&config_path, &["config", "auto-update", "--interval", &huge]);
    assert!(!success);
    assert!(stderr.contains("too large"), "stderr={}", stderr);
}

#[test]
fn test_status_reports_counts() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_vidx(&config_path, &["status"]);
    assert!(success, "status failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("3 current, 0 deleted"), "stdout={}", stdout);
    assert!(stdout.contains("3 rows x 256 dims"), "stdout={}", stdout);
}

#[test]
fn test_recent_and_file_details() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_vidx(&config_path, &["recent", "--hours", "1"]);
    assert!(success);
    assert!(stdout.contains("alpha.md"));

    let (stdout, _, success) = run_vidx(&config_path, &["files", "--path", "alpha.md"]);
    assert!(success);
    assert!(stdout.contains("status:     current"));

    let (_, stderr, success) = run_vidx(&config_path, &["files", "--path", "nope.md"]);
    assert!(!success);
    assert!(stderr.contains("No record"));
}

#[test]
fn test_scan_missing_root_fails() {
    let (_tmp, config_path) = setup_test_env();
    fs::remove_dir_all(vault_of(&config_path)).unwrap();

    let (_, stderr, success) = run_vidx(&config_path, &["index", "scan", "--full"]);
    assert!(!success);
    assert!(stderr.contains("does not exist"), "stderr={}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_vidx(&tmp.path().join("nope.toml"), &["status"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
