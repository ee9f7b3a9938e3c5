//! Order-insensitive comparison of the decrypted export with the fixture.
//!
//! Records come out of the workflow in no particular order, so the actual
//! file is sorted and diffed against a fixture that was sorted the same way.
//! `LC_ALL=C` pins the collation so the fixture stays valid across hosts.

use std::path::{Path, PathBuf};

use crate::tool_traits::{ToolArgs, path_arg};

/// `sort -o <output> <input>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortArgs {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl ToolArgs for SortArgs {
    fn program(&self) -> &Path {
        Path::new("sort")
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            path_arg(&self.output),
            path_arg(&self.input),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![("LC_ALL".to_string(), "C".to_string())]
    }

    fn tool_name(&self) -> &'static str {
        "sort"
    }
}

/// `diff <actual> <expected>`; exit status 1 means the files differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffArgs {
    pub actual: PathBuf,
    pub expected: PathBuf,
}

impl ToolArgs for DiffArgs {
    fn program(&self) -> &Path {
        Path::new("diff")
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![path_arg(&self.actual), path_arg(&self.expected)]
    }

    fn tool_name(&self) -> &'static str {
        "diff"
    }
}
