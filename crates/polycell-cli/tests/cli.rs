//! End-to-end tests for the polycell CLI.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin for tests

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// A temporary directory holding one source file.
struct TestSource {
    temp_dir: TempDir,
    source_path: PathBuf,
}

impl TestSource {
    fn new(filename: &str, source: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source_path = temp_dir.path().join(filename);
        fs::write(&source_path, source).expect("Failed to write source");

        Self {
            temp_dir,
            source_path,
        }
    }

    fn path(&self) -> &PathBuf {
        &self.source_path
    }

    /// Write a config file whose artifacts land in a private directory.
    fn config(&self, extra: &str) -> PathBuf {
        let artifacts = self.temp_dir.path().join("artifacts");
        fs::create_dir_all(&artifacts).expect("Failed to create artifacts dir");
        let config = format!(
            r#"{{"temp_dir": {}{}}}"#,
            serde_json::to_string(&artifacts).unwrap(),
            extra
        );
        let path = self.temp_dir.path().join("polycell.json");
        fs::write(&path, config).expect("Failed to write config");
        path
    }

    fn artifacts_empty(&self) -> bool {
        fs::read_dir(self.temp_dir.path().join("artifacts"))
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

fn polycell() -> Command {
    Command::cargo_bin("polycell").unwrap()
}

fn on_path(binary: &str) -> bool {
    std::process::Command::new(binary)
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

// =============================================================================
// transform
// =============================================================================

#[test]
fn test_transform_javascript_file() {
    let source = TestSource::new("cell.js", "const x = 5;\nx * 2");

    polycell()
        .arg("transform")
        .arg(source.path())
        .args(["--lang", "js"])
        .assert()
        .success()
        .stdout("const x = 5;\nreturn x * 2\n");
}

#[test]
fn test_transform_typescript_stdin_hoists_imports() {
    polycell()
        .args(["transform", "-", "--lang", "ts"])
        .write_stdin("const p: string = join('a', 'b');\nimport { join } from 'path';\np")
        .assert()
        .success()
        .stdout("import { join } from 'path';\nconst p: string = join('a', 'b');\nreturn p\n");
}

#[test]
fn test_transform_block_unchanged() {
    polycell()
        .args(["transform", "-", "--lang", "javascript"])
        .write_stdin("function foo() { return 1; }")
        .assert()
        .success()
        .stdout("function foo() { return 1; }\n");
}

#[test]
fn test_transform_rejects_rust() {
    polycell()
        .args(["transform", "-", "--lang", "rust"])
        .write_stdin("1 + 1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("javascript and typescript"));
}

// =============================================================================
// run
// =============================================================================

#[test]
fn test_run_unknown_language() {
    polycell()
        .args(["run", "-", "--lang", "cobol"])
        .write_stdin("DISPLAY 'HI'.")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown language: cobol"));
}

#[test]
fn test_run_cannot_infer_language() {
    let source = TestSource::new("notes.md", "# heading");

    polycell()
        .arg("run")
        .arg(source.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot infer language"));
}

#[test]
fn test_run_missing_file() {
    polycell()
        .args(["run", "/nonexistent/cell.py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn test_run_broken_runtime_reports_error_result() {
    let source = TestSource::new("cell.js", "1 + 1");
    let config = source.config(r#", "toolchains": {"javascript": "/nonexistent/polycell-node"}"#);

    let output = polycell()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(source.path())
        .args(["--cell-id", "c-42", "--json"])
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();

    let result: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(result["cell_id"], "c-42");
    assert_eq!(result["status"], "error");
    assert!(result["result"].is_null());
    assert_eq!(result["error"]["kind"], "ExecutionError");
    assert!(source.artifacts_empty());
}

#[test]
fn test_run_bad_config_file() {
    let source = TestSource::new("polycell.json", "{ not json");

    polycell()
        .arg("--config")
        .arg(source.path())
        .arg("toolchains")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn test_run_javascript_expression() {
    if !on_path("bun") && !on_path("node") {
        eprintln!("Skipping: no JavaScript runtime on PATH");
        return;
    }
    let source = TestSource::new("cell.js", "console.log('side');\n5 + 3");
    let config = source.config("");

    polycell()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(source.path())
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""result": "8""#))
        .stdout(predicate::str::contains(r#""content": "side""#));

    assert!(source.artifacts_empty());
}

#[test]
fn test_run_javascript_throw_exits_non_zero() {
    if !on_path("bun") && !on_path("node") {
        eprintln!("Skipping: no JavaScript runtime on PATH");
        return;
    }
    let source = TestSource::new("cell.js", "throw new Error('Test error')");
    let config = source.config("");

    polycell()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(source.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Test error"));
}

// =============================================================================
// toolchains
// =============================================================================

#[test]
fn test_toolchains_lists_every_toolchain() {
    polycell()
        .arg("toolchains")
        .assert()
        .success()
        .stdout(predicate::str::contains("Python interpreter"))
        .stdout(predicate::str::contains("Rust compiler (rustc)"))
        .stdout(predicate::str::contains("JavaScript runtime"))
        .stdout(predicate::str::contains("TypeScript runtime (bun)"));
}
