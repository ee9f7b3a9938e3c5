//! Export Acceptance - main entry point
//!
//! Drives the export pipeline end to end against a staging environment and
//! exits non-zero with the full cause chain on the first failure.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use export_acceptance::cli::{CaseOptions, Cli, Commands};
use export_acceptance::config::{AcceptanceConfig, HarnessSettings, ToolPaths};
use export_acceptance::credentials::DatabaseCredentials;
use export_acceptance::exporter_config::ExporterConfig;
use export_acceptance::layout::{self, ExportLayout};
use export_acceptance::pipeline::ExportAcceptance;
use export_acceptance::process_guard;
use export_acceptance::sanity;
use export_acceptance::storage::{S3ObjectStore, S3StoreConfig};

/// Initialize tracing; RUST_LOG overrides the level picked from `-v`.
fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(case: &CaseOptions) -> Result<AcceptanceConfig> {
    let config = match &case.config_file {
        Some(path) => AcceptanceConfig::load_from_file(path)?,
        None => AcceptanceConfig::from_env()?,
    };
    Ok(config)
}

fn preflight(settings: &HarnessSettings, config: &AcceptanceConfig, tools: &ToolPaths) -> bool {
    let layout = ExportLayout::new(settings, config, Utc::now());
    let report = sanity::verify_environment(tools, settings, &layout.exported_filename);
    if !report.is_ok() {
        eprintln!("Pre-flight checks failed:\n{}", report.describe());
    }
    report.is_ok()
}

fn run(
    case: &CaseOptions,
    keep_workspace: bool,
    store_config: S3StoreConfig,
    skip_preflight: bool,
) -> Result<ExitCode> {
    let settings = HarnessSettings {
        keep_workspace,
        ..case.to_settings()
    };
    let config = load_config(case)?;
    let tools = ToolPaths::from_env()?;

    if skip_preflight {
        warn!("Skipping pre-flight checks");
    } else if !preflight(&settings, &config, &tools) {
        return Ok(ExitCode::FAILURE);
    }

    let store = S3ObjectStore::new(&store_config).context("Failed to set up S3 client")?;
    let acceptance = ExportAcceptance::new(settings, config, tools, Box::new(store), Utc::now())?;
    let summary = acceptance.run()?;

    println!("Export acceptance passed");
    for (stage, elapsed) in &summary.durations {
        println!("  {:<28} {:>8.1}s", stage.to_string(), elapsed.as_secs_f64());
    }
    if let Some(dir) = summary.workspace {
        println!("Workspace kept at {}", dir.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn check(case: &CaseOptions) -> Result<ExitCode> {
    let settings = case.to_settings();
    settings.validate()?;
    let config = load_config(case)?;
    let tools = ToolPaths::from_env()?;

    if !preflight(&settings, &config, &tools) {
        return Ok(ExitCode::FAILURE);
    }
    let now = Utc::now();
    let layout = ExportLayout::new(&settings, &config, now);
    println!("Configuration OK for '{}'", config.identifier);
    println!("  task output: {}", layout.task_output_url());
    println!("  package:     {} (if exported today)", layout.package(now).location);
    Ok(ExitCode::SUCCESS)
}

fn render_config(
    case: &CaseOptions,
    credentials_file: &Path,
    external_files: &Path,
) -> Result<ExitCode> {
    let settings = case.to_settings();
    settings.validate()?;
    let json = fs::read_to_string(credentials_file)
        .with_context(|| format!("Failed to read {}", credentials_file.display()))?;
    let credentials = DatabaseCredentials::from_json(&json)?;
    let rendered = ExporterConfig::new(
        &settings,
        &credentials,
        &layout::org_id(&settings.course_id),
        external_files,
    )
    .to_yaml()?;
    print!("{}", rendered);
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    info!("Export acceptance {} starting", env!("CARGO_PKG_VERSION"));

    // Children run in their own process groups, so an interrupt has to be
    // forwarded to them explicitly.
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    let result = match &cli.command {
        Commands::Run {
            case,
            keep_workspace,
            s3_endpoint,
            s3_region,
            skip_preflight,
        } => run(
            case,
            *keep_workspace,
            S3StoreConfig {
                region: s3_region.clone(),
                endpoint: s3_endpoint.clone(),
                force_path_style: s3_endpoint.is_some(),
            },
            *skip_preflight,
        ),
        Commands::Check { case } => check(case),
        Commands::RenderConfig {
            credentials_file,
            external_files,
            case,
        } => render_config(case, credentials_file, external_files),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Export acceptance failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

