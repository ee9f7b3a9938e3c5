//! Run configuration.
//!
//! Three sources feed a run:
//!
//! - `AcceptanceConfig`: the JSON blob in `ACCEPTANCE_TEST_CONFIG` describing
//!   the staging environment (buckets, job flow, credentials URL).
//! - `ToolPaths`: the two executables under test, from `REMOTE_TASK` and
//!   `EXPORTER`.
//! - `HarnessSettings`: constants of the test case itself (course, table,
//!   parallelism), overridable from the command line.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{HarnessError, Result};
use crate::target::url_path_join;

/// Environment variable holding the JSON config blob.
pub const CONFIG_ENV: &str = "ACCEPTANCE_TEST_CONFIG";
/// Environment variable naming the remote task launcher.
pub const REMOTE_TASK_ENV: &str = "REMOTE_TASK";
/// Environment variable naming the legacy exporter.
pub const EXPORTER_ENV: &str = "EXPORTER";

/// Keys the JSON blob must carry, in the order they are reported.
pub const REQUIRED_KEYS: [&str; 8] = [
    "identifier",
    "tasks_output_url",
    "credentials_file_url",
    "job_flow_name",
    "tasks_branch",
    "tasks_log_path",
    "connection_user",
    "exporter_output_bucket",
];

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    tasks_output_url: Option<String>,
    #[serde(default)]
    credentials_file_url: Option<String>,
    #[serde(default)]
    job_flow_name: Option<String>,
    #[serde(default)]
    tasks_branch: Option<String>,
    #[serde(default)]
    tasks_log_path: Option<String>,
    #[serde(default)]
    connection_user: Option<String>,
    #[serde(default)]
    exporter_output_bucket: Option<String>,
}

/// Staging environment description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptanceConfig {
    /// Distinguishes parallel runs. Reusing one lets the remote side reuse
    /// its virtualenvs, so it is not randomized per run.
    pub identifier: String,
    /// Directory URL the export workflow writes under.
    pub tasks_output_url: String,
    /// URL of the JSON file with MySQL connection details.
    pub credentials_file_url: String,
    /// Existing job flow to run the workflow on.
    pub job_flow_name: String,
    /// Branch of the tasks repository to deploy, independent of the checkout
    /// running this harness.
    pub tasks_branch: String,
    /// Where the workflow writes its logs.
    pub tasks_log_path: String,
    /// SSH user for the job flow.
    pub connection_user: String,
    /// Bucket the legacy exporter uploads the package to.
    pub exporter_output_bucket: String,
}

impl AcceptanceConfig {
    /// Parse the JSON blob, reporting every missing key at once.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)?;

        let values = [
            raw.identifier,
            raw.tasks_output_url,
            raw.credentials_file_url,
            raw.job_flow_name,
            raw.tasks_branch,
            raw.tasks_log_path,
            raw.connection_user,
            raw.exporter_output_bucket,
        ];

        let missing: Vec<&'static str> = REQUIRED_KEYS
            .iter()
            .zip(values.iter())
            .filter(|(_, v)| v.as_deref().is_none_or(|s| s.trim().is_empty()))
            .map(|(k, _)| *k)
            .collect();
        if !missing.is_empty() {
            return Err(HarnessError::MissingConfigKeys(missing));
        }

        let [
            identifier,
            tasks_output_url,
            credentials_file_url,
            job_flow_name,
            tasks_branch,
            tasks_log_path,
            connection_user,
            exporter_output_bucket,
        ] = values.map(|v| v.unwrap_or_default().trim().to_string());

        if identifier.contains('/') {
            return Err(HarnessError::config(
                "identifier must not contain '/'",
            ));
        }

        Ok(Self {
            identifier,
            tasks_output_url,
            credentials_file_url,
            job_flow_name,
            tasks_branch,
            tasks_log_path,
            connection_user,
            exporter_output_bucket,
        })
    }

    /// Read the blob from `ACCEPTANCE_TEST_CONFIG`.
    pub fn from_env() -> Result<Self> {
        let json = env::var(CONFIG_ENV).map_err(|_| HarnessError::MissingEnv(CONFIG_ENV))?;
        Self::from_json(&json)
    }

    /// Read the blob from a file instead of the environment.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            HarnessError::config(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    /// `<tasks_output_url>/<identifier>`
    pub fn task_output_root(&self) -> String {
        url_path_join(&self.tasks_output_url, &[&self.identifier])
    }

    /// Key prefix the legacy exporter uploads under.
    pub fn output_prefix(&self) -> String {
        format!("automation/{}/", self.identifier)
    }
}

/// The executables under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub remote_task: PathBuf,
    pub exporter: PathBuf,
}

impl ToolPaths {
    pub fn from_env() -> Result<Self> {
        let remote_task = env::var_os(REMOTE_TASK_ENV)
            .filter(|v| !v.is_empty())
            .ok_or(HarnessError::MissingEnv(REMOTE_TASK_ENV))?;
        let exporter = env::var_os(EXPORTER_ENV)
            .filter(|v| !v.is_empty())
            .ok_or(HarnessError::MissingEnv(EXPORTER_ENV))?;
        Ok(Self {
            remote_task: PathBuf::from(remote_task),
            exporter: PathBuf::from(exporter),
        })
    }
}

/// Constants of the test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessSettings {
    pub environment: String,
    pub table: String,
    pub course_id: String,
    pub num_mappers: u32,
    pub num_reducers: u32,
    pub workflow: String,
    pub exporter_task: String,
    pub recipient: String,
    /// Directory name the exporter resolves recipient keys from.
    pub gpg_keys_dir: String,
    /// Armored secret key able to decrypt the package.
    pub secret_key_file: PathBuf,
    pub fixtures_dir: PathBuf,
    /// `unzip` used to unpack the package; bare names go through `PATH`.
    pub unzip_program: PathBuf,
    /// `gpg` used to import the key and decrypt.
    pub gpg_program: PathBuf,
    /// Leave the temporary workspace behind for inspection.
    pub keep_workspace: bool,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            environment: "acceptance".to_string(),
            table: "courseware_studentmodule".to_string(),
            course_id: "edX/E929/2014_T1".to_string(),
            num_mappers: 4,
            num_reducers: 2,
            workflow: "StudentModulePerCourseAfterImportWorkflow".to_string(),
            exporter_task: "StudentModuleTask".to_string(),
            recipient: "daemon@edx.org".to_string(),
            gpg_keys_dir: "gpg-keys".to_string(),
            secret_key_file: PathBuf::from("gpg-keys/insecure_secret.key"),
            fixtures_dir: PathBuf::from("fixtures"),
            unzip_program: PathBuf::from("unzip"),
            gpg_program: PathBuf::from("gpg"),
            keep_workspace: false,
        }
    }
}

impl HarnessSettings {
    pub fn validate(&self) -> Result<()> {
        if self.environment.trim().is_empty() {
            return Err(HarnessError::config("environment must be specified"));
        }
        if self.table.trim().is_empty() {
            return Err(HarnessError::config("table must be specified"));
        }
        let segments: Vec<&str> = self.course_id.split('/').collect();
        if segments.len() != 3 || segments.iter().any(|s| s.trim().is_empty()) {
            return Err(HarnessError::config(format!(
                "course id '{}' must look like org/course/run",
                self.course_id
            )));
        }
        if self.num_mappers == 0 || self.num_reducers == 0 {
            return Err(HarnessError::config(
                "mapper and reducer counts must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "identifier": "nightly",
        "tasks_output_url": "s3://tasks-bucket/output/",
        "credentials_file_url": "s3://secure/creds.json",
        "job_flow_name": "acceptance-flow",
        "tasks_branch": "master",
        "tasks_log_path": "/tmp/acceptance-logs",
        "connection_user": "hadoop",
        "exporter_output_bucket": "export-bucket",
        "unused_extra": 42
    }"#;

    #[test]
    fn test_full_config_parses() {
        let config = AcceptanceConfig::from_json(FULL).unwrap();
        assert_eq!(config.identifier, "nightly");
        assert_eq!(config.task_output_root(), "s3://tasks-bucket/output/nightly");
        assert_eq!(config.output_prefix(), "automation/nightly/");
    }

    #[test]
    fn test_missing_keys_reported_together() {
        let err = AcceptanceConfig::from_json(r#"{"identifier": "x", "tasks_branch": " "}"#)
            .unwrap_err();
        match err {
            HarnessError::MissingConfigKeys(keys) => {
                assert_eq!(
                    keys,
                    vec![
                        "tasks_output_url",
                        "credentials_file_url",
                        "job_flow_name",
                        "tasks_branch",
                        "tasks_log_path",
                        "connection_user",
                        "exporter_output_bucket",
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            AcceptanceConfig::from_json("not json"),
            Err(HarnessError::Json(_))
        ));
    }

    #[test]
    fn test_identifier_with_slash_rejected() {
        let json = FULL.replace("\"nightly\"", "\"a/b\"");
        assert!(matches!(
            AcceptanceConfig::from_json(&json),
            Err(HarnessError::Config(_))
        ));
    }

    #[test]
    fn test_default_settings_are_valid() {
        let settings = HarnessSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.num_mappers, 4);
        assert_eq!(settings.num_reducers, 2);
    }

    #[test]
    fn test_settings_reject_bad_course_id() {
        let settings = HarnessSettings {
            course_id: "edX/E929".to_string(),
            ..HarnessSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), FULL).unwrap();
        let config = AcceptanceConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.exporter_output_bucket, "export-bucket");
    }
}
