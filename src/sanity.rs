//! Pre-flight checks for the runtime environment
//!
//! Verifies, before anything touches the database or a bucket:
//! - `sort` and `diff` are on `PATH`
//! - the configured `unzip` and `gpg` resolve to executables
//! - the two executables under test exist and are executable
//! - the fixture files and the decryption key are present
//!
//! A run that would fail at the last stage for a missing `gpg` should fail
//! in the first second instead.

use std::env;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{EXPORTER_ENV, HarnessSettings, REMOTE_TASK_ENV, ToolPaths};
use crate::fixtures::Fixtures;

/// Tools the validation stage always takes from `PATH`.
pub const REQUIRED_BINARIES: &[&str] = &["sort", "diff"];

/// Result of environment verification
#[derive(Debug, Default)]
pub struct PreflightReport {
    pub missing_binaries: Vec<String>,
    /// (environment variable, configured path)
    pub unusable_executables: Vec<(&'static str, PathBuf)>,
    pub missing_files: Vec<PathBuf>,
}

impl PreflightReport {
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty()
            && self.unusable_executables.is_empty()
            && self.missing_files.is_empty()
    }

    /// Human-readable list of every problem found.
    pub fn describe(&self) -> String {
        let mut lines = Vec::new();
        if !self.missing_binaries.is_empty() {
            lines.push(format!(
                "missing required binaries: {}",
                self.missing_binaries.join(", ")
            ));
        }
        for (var, path) in &self.unusable_executables {
            lines.push(format!(
                "{} points at {}, which is not an executable file",
                var,
                path.display()
            ));
        }
        for path in &self.missing_files {
            lines.push(format!("missing file: {}", path.display()));
        }
        lines.join("\n")
    }
}

/// Look `name` up on `PATH` the way a shell would.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable_file(candidate))
}

fn is_executable_file(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Paths with a separator are used as-is; bare names are searched on `PATH`.
fn resolve_executable(path: &Path) -> Option<PathBuf> {
    if path.components().count() > 1 {
        is_executable_file(path).then(|| path.to_path_buf())
    } else {
        find_on_path(&path.to_string_lossy())
    }
}

/// Run every check and collect the results.
pub fn verify_environment(
    tools: &ToolPaths,
    settings: &HarnessSettings,
    exported_filename: &str,
) -> PreflightReport {
    let mut report = PreflightReport::default();

    for binary in REQUIRED_BINARIES {
        match find_on_path(binary) {
            Some(found) => debug!("Found {} at {}", binary, found.display()),
            None => report.missing_binaries.push((*binary).to_string()),
        }
    }
    for program in [&settings.unzip_program, &settings.gpg_program] {
        match resolve_executable(program) {
            Some(found) => debug!("Found {} at {}", program.display(), found.display()),
            None => report.missing_binaries.push(program.display().to_string()),
        }
    }

    for (var, path) in [
        (REMOTE_TASK_ENV, &tools.remote_task),
        (EXPORTER_ENV, &tools.exporter),
    ] {
        if resolve_executable(path).is_none() {
            report.unusable_executables.push((var, path.clone()));
        }
    }

    let fixtures = Fixtures::new(settings.fixtures_dir.clone());
    for path in [
        fixtures.load_sql(&settings.table),
        fixtures.expected_output(exported_filename),
        settings.secret_key_file.clone(),
    ] {
        if !path.is_file() {
            report.missing_files.push(path);
        }
    }

    if report.is_ok() {
        info!("Pre-flight checks passed");
    }
    report
}
