//! Unpacking the exporter's zip.

use std::path::{Path, PathBuf};

use crate::tool_traits::{ToolArgs, path_arg};

/// `unzip -o <archive> -d <dest>`
///
/// `-o` overwrites without prompting, which matters when a kept workspace is
/// reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnzipArgs {
    /// `unzip` binary; a bare name is looked up on `PATH`.
    pub program: PathBuf,
    pub archive: PathBuf,
    pub dest: PathBuf,
}

impl ToolArgs for UnzipArgs {
    fn program(&self) -> &Path {
        &self.program
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            path_arg(&self.archive),
            "-d".to_string(),
            path_arg(&self.dest),
        ]
    }

    fn tool_name(&self) -> &'static str {
        "unzip"
    }
}
