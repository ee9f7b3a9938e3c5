//! GnuPG key import and decryption.
//!
//! Both run against a throwaway `--homedir` inside the workspace so the
//! operator's own keyring is never touched. `--batch` keeps gpg from ever
//! waiting on a TTY.

use std::path::{Path, PathBuf};

use crate::tool_traits::{ToolArgs, path_arg};

/// `gpg --homedir H --batch --armor --import <key>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpgImportArgs {
    pub program: PathBuf,
    pub homedir: PathBuf,
    pub key_file: PathBuf,
}

impl ToolArgs for GpgImportArgs {
    fn program(&self) -> &Path {
        &self.program
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "--homedir".to_string(),
            path_arg(&self.homedir),
            "--batch".to_string(),
            "--armor".to_string(),
            "--import".to_string(),
            path_arg(&self.key_file),
        ]
    }

    fn tool_name(&self) -> &'static str {
        "gpg-import"
    }
}

/// `gpg --homedir H --batch --yes --output O --decrypt <file>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpgDecryptArgs {
    pub program: PathBuf,
    pub homedir: PathBuf,
    pub output: PathBuf,
    pub encrypted: PathBuf,
}

impl ToolArgs for GpgDecryptArgs {
    fn program(&self) -> &Path {
        &self.program
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "--homedir".to_string(),
            path_arg(&self.homedir),
            "--batch".to_string(),
            "--yes".to_string(),
            "--output".to_string(),
            path_arg(&self.output),
            "--decrypt".to_string(),
            path_arg(&self.encrypted),
        ]
    }

    fn tool_name(&self) -> &'static str {
        "gpg-decrypt"
    }
}
