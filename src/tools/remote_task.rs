//! Launcher for the distributed export workflow.
//!
//! `remote-task` deploys the tasks repository at a branch onto an existing
//! job flow and runs one workflow there. `--wait` keeps it attached until the
//! workflow finishes, so its exit status is the workflow's.

use std::path::{Path, PathBuf};

use crate::tool_traits::ToolArgs;

/// Arguments for `remote-task ... <workflow> ...`.
///
/// Flags before the workflow name configure the launcher; flags after it are
/// passed through to the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTaskArgs {
    pub executable: PathBuf,
    pub job_flow_name: String,
    pub branch: String,
    pub remote_name: String,
    pub log_path: String,
    pub user: String,
    pub workflow: String,
    pub credentials: String,
    pub dump_root: String,
    pub output_root: String,
    pub output_suffix: String,
    pub num_mappers: u32,
    pub n_reduce_tasks: u32,
}

impl ToolArgs for RemoteTaskArgs {
    fn program(&self) -> &Path {
        &self.executable
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "--job-flow-name".to_string(),
            self.job_flow_name.clone(),
            "--branch".to_string(),
            self.branch.clone(),
            "--remote-name".to_string(),
            self.remote_name.clone(),
            "--wait".to_string(),
            "--log-path".to_string(),
            self.log_path.clone(),
            "--user".to_string(),
            self.user.clone(),
            self.workflow.clone(),
            "--local-scheduler".to_string(),
            "--credentials".to_string(),
            self.credentials.clone(),
            "--dump-root".to_string(),
            self.dump_root.clone(),
            "--output-root".to_string(),
            self.output_root.clone(),
            "--output-suffix".to_string(),
            self.output_suffix.clone(),
            "--num-mappers".to_string(),
            self.num_mappers.to_string(),
            "--n-reduce-tasks".to_string(),
            self.n_reduce_tasks.to_string(),
        ]
    }

    fn tool_name(&self) -> &'static str {
        "remote-task"
    }
}
