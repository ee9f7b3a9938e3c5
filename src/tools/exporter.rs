//! Legacy exporter invocation.
//!
//! The exporter dumps course tables, pulls externally generated files from
//! `<external_files>/<external-prefix>/`, encrypts each file for the
//! organization's recipient and uploads one zip per organization to
//! `s3://<bucket>/<output-prefix><org>-<date>.zip`.

use std::path::{Path, PathBuf};

use crate::tool_traits::{ToolArgs, path_arg};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterArgs {
    pub executable: PathBuf,
    pub work_dir: PathBuf,
    pub bucket: String,
    pub course_id: String,
    pub external_prefix: String,
    pub output_prefix: String,
    pub config_file: PathBuf,
    pub environment: String,
    pub org: String,
    pub task: String,
}

impl ToolArgs for ExporterArgs {
    fn program(&self) -> &Path {
        &self.executable
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "--work-dir".to_string(),
            path_arg(&self.work_dir),
            "--bucket".to_string(),
            self.bucket.clone(),
            "--course-id".to_string(),
            self.course_id.clone(),
            "--external-prefix".to_string(),
            self.external_prefix.clone(),
            "--output-prefix".to_string(),
            self.output_prefix.clone(),
            path_arg(&self.config_file),
            "--env".to_string(),
            self.environment.clone(),
            "--org".to_string(),
            self.org.clone(),
            "--task".to_string(),
            self.task.clone(),
        ]
    }

    fn tool_name(&self) -> &'static str {
        "exporter"
    }
}
