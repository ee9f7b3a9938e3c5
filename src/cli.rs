use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::HarnessSettings;

/// Export Acceptance - end-to-end check of the research data export pipeline
#[derive(Parser)]
#[command(name = "export-acceptance")]
#[command(about = "Seed, export, package and validate a course data export end to end")]
#[command(version)]
pub struct Cli {
    /// Verbose logging (debug level). RUST_LOG overrides.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline against the staging environment
    Run {
        #[command(flatten)]
        case: CaseOptions,

        /// Keep the temporary workspace after the run
        #[arg(long)]
        keep_workspace: bool,

        /// Custom S3 endpoint (forces path-style addressing)
        #[arg(long)]
        s3_endpoint: Option<String>,

        /// AWS region override
        #[arg(long)]
        s3_region: Option<String>,

        /// Skip the pre-flight environment checks
        #[arg(long)]
        skip_preflight: bool,
    },
    /// Validate configuration and environment without external effects
    Check {
        #[command(flatten)]
        case: CaseOptions,
    },
    /// Print the exporter configuration a run would write
    RenderConfig {
        /// Local JSON file with database credentials
        #[arg(long)]
        credentials_file: PathBuf,

        /// Directory to name as the exporter's external files root
        #[arg(long, default_value = "/tmp/external")]
        external_files: PathBuf,

        #[command(flatten)]
        case: CaseOptions,
    },
}

/// Options that select the test case.
#[derive(Args, Debug, Clone)]
pub struct CaseOptions {
    /// Read the config JSON from a file instead of ACCEPTANCE_TEST_CONFIG
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Directory holding input/ and output/ fixtures
    #[arg(long, default_value = "fixtures")]
    pub fixtures_dir: PathBuf,

    /// Course to export
    #[arg(long, default_value = "edX/E929/2014_T1")]
    pub course_id: String,

    /// Environment name passed to the workflow and exporter
    #[arg(long, default_value = "acceptance")]
    pub environment: String,

    /// Armored secret key that decrypts the package
    #[arg(long, default_value = "gpg-keys/insecure_secret.key")]
    pub secret_key: PathBuf,

    /// unzip binary used to unpack the package
    #[arg(long, default_value = "unzip")]
    pub unzip: PathBuf,

    /// gpg binary used to import the key and decrypt
    #[arg(long, default_value = "gpg")]
    pub gpg: PathBuf,
}

impl CaseOptions {
    /// Settings for this case, defaults for everything not on the CLI.
    pub fn to_settings(&self) -> HarnessSettings {
        HarnessSettings {
            course_id: self.course_id.clone(),
            environment: self.environment.clone(),
            fixtures_dir: self.fixtures_dir.clone(),
            secret_key_file: self.secret_key.clone(),
            unzip_program: self.unzip.clone(),
            gpg_program: self.gpg.clone(),
            ..HarnessSettings::default()
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["export-acceptance"]).is_err());
    }

    #[test]
    fn test_cli_run_defaults_match_settings() {
        let cli = Cli::try_parse_from(["export-acceptance", "run"]).unwrap();
        match cli.command {
            Commands::Run {
                case,
                keep_workspace,
                s3_endpoint,
                skip_preflight,
                ..
            } => {
                assert_eq!(case.to_settings(), HarnessSettings::default());
                assert!(!keep_workspace);
                assert!(s3_endpoint.is_none());
                assert!(!skip_preflight);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "export-acceptance",
            "-v",
            "run",
            "--config-file",
            "/etc/acceptance.json",
            "--course-id",
            "MITx/6.002x/2013_Spring",
            "--keep-workspace",
            "--s3-endpoint",
            "http://localhost:9000",
            "--gpg",
            "/opt/gnupg/bin/gpg",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                case,
                keep_workspace,
                s3_endpoint,
                ..
            } => {
                let settings = case.to_settings();
                assert_eq!(settings.gpg_program, PathBuf::from("/opt/gnupg/bin/gpg"));
                assert_eq!(settings.unzip_program, PathBuf::from("unzip"));
                assert_eq!(
                    case.config_file.unwrap().to_str().unwrap(),
                    "/etc/acceptance.json"
                );
                assert_eq!(case.course_id, "MITx/6.002x/2013_Spring");
                assert!(keep_workspace);
                assert_eq!(s3_endpoint.as_deref(), Some("http://localhost:9000"));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_render_config_requires_credentials() {
        assert!(Cli::try_parse_from(["export-acceptance", "render-config"]).is_err());
        let cli = Cli::try_parse_from([
            "export-acceptance",
            "render-config",
            "--credentials-file",
            "creds.json",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::RenderConfig { .. }));
    }
}
