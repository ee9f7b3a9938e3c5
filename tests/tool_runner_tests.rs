//! Tests for running external tools
//!
//! These tests spawn real, ubiquitous binaries (`sh`, `sort`, `diff`) and
//! verify:
//! - stdout/stderr capture and exit status reporting
//! - environment passed through `ToolArgs::get_env_vars`
//! - error messages from `run_tool_checked`
//! - order-insensitive comparison via `compare_sorted`

use export_acceptance::pipeline::compare_sorted;
use export_acceptance::tool_runner::{run_tool, run_tool_checked};
use export_acceptance::tool_traits::ToolArgs;
use std::fs;
use std::path::{Path, PathBuf};

/// `sh -c <script>` with optional extra environment.
struct ShellArgs {
    script: String,
    env: Vec<(String, String)>,
}

impl ShellArgs {
    fn new(script: &str) -> Self {
        Self {
            script: script.to_string(),
            env: Vec::new(),
        }
    }
}

impl ToolArgs for ShellArgs {
    fn program(&self) -> &Path {
        Path::new("sh")
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-c".to_string(), self.script.clone()]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        self.env.clone()
    }

    fn tool_name(&self) -> &'static str {
        "sh"
    }
}

struct MissingProgram;

impl ToolArgs for MissingProgram {
    fn program(&self) -> &Path {
        Path::new("/nonexistent/bin/remote-task")
    }

    fn to_cli_args(&self) -> Vec<String> {
        Vec::new()
    }

    fn tool_name(&self) -> &'static str {
        "remote-task"
    }
}

// =============================================================================
// run_tool Tests
// =============================================================================

#[test]
fn test_captures_stdout_and_stderr() {
    let output = run_tool(&ShellArgs::new("echo out; echo err >&2")).unwrap();
    assert!(output.success);
    assert_eq!(output.exit_code, Some(0));
    assert_eq!(output.stdout, "out\n");
    assert_eq!(output.stderr, "err\n");
    assert_eq!(output.tool, "sh");
}

#[test]
fn test_nonzero_exit_is_reported_not_raised() {
    let output = run_tool(&ShellArgs::new("exit 3")).unwrap();
    assert!(!output.success);
    assert_eq!(output.exit_code, Some(3));
}

#[test]
fn test_env_vars_reach_child() {
    let mut args = ShellArgs::new("printf '%s' \"$EXPORT_MARKER\"");
    args.env.push(("EXPORT_MARKER".to_string(), "present".to_string()));
    let output = run_tool(&args).unwrap();
    assert_eq!(output.stdout, "present\n");
}

#[test]
fn test_stdin_is_closed() {
    // `cat` would block forever on an inherited terminal.
    let output = run_tool(&ShellArgs::new("cat; echo done")).unwrap();
    assert!(output.success);
    assert_eq!(output.stdout, "done\n");
}

#[test]
fn test_spawn_failure_is_error() {
    let err = run_tool(&MissingProgram).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to spawn /nonexistent/bin/remote-task"));
}

#[test]
fn test_checked_failure_message() {
    let err = run_tool_checked(
        &ShellArgs::new("echo 'workflow exploded' >&2; exit 1"),
        "Export workflow",
    )
    .unwrap_err();
    let msg = err.to_string();
    assert!(msg.starts_with("Export workflow failed (sh exited with 1)"));
    assert!(msg.contains("workflow exploded"));
}

// =============================================================================
// compare_sorted Tests
// =============================================================================

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_compare_sorted_ignores_record_order() {
    let dir = tempfile::tempdir().unwrap();
    let actual = write(dir.path(), "actual.sql", "3\tc\n1\ta\n2\tb\n");
    let expected = write(dir.path(), "expected.sorted", "1\ta\n2\tb\n3\tc\n");
    let sorted = dir.path().join("actual.sql.sorted");

    compare_sorted(&actual, &sorted, &expected).unwrap();
    assert_eq!(fs::read_to_string(&sorted).unwrap(), "1\ta\n2\tb\n3\tc\n");
}

#[test]
fn test_compare_sorted_reports_difference() {
    let dir = tempfile::tempdir().unwrap();
    let actual = write(dir.path(), "actual.sql", "2\tb\n1\ta\n");
    let expected = write(dir.path(), "expected.sorted", "1\ta\n2\tB\n");
    let sorted = dir.path().join("actual.sql.sorted");

    let err = compare_sorted(&actual, &sorted, &expected).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("Comparing export with expected output failed (diff exited with 1)"));
    assert!(msg.contains("2\tB"));
}

#[test]
fn test_compare_sorted_missing_expected() {
    let dir = tempfile::tempdir().unwrap();
    let actual = write(dir.path(), "actual.sql", "1\n");
    let err = compare_sorted(
        &actual,
        &dir.path().join("actual.sql.sorted"),
        &dir.path().join("missing.sorted"),
    )
    .unwrap_err();
    assert!(err.to_string().contains("diff exited with 2"));
}
