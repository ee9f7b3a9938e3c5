//! The end-to-end acceptance run.
//!
//! `ExportAcceptance` emulates, as closely as possible, what an operator does
//! to produce a research data package, and checks the user-visible result:
//!
//! 1. make sure the test database exists
//! 2. load the source table from a static fixture
//! 3. run the export workflow on the job flow
//! 4. download its per-course output into the exporter's external files dir
//! 5. run the legacy exporter, which packages, encrypts and uploads
//! 6. download, unpack, decrypt and compare the package with the fixture,
//!    ignoring record order
//!
//! Every step fails loudly; nothing is retried.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::{AcceptanceConfig, HarnessSettings, ToolPaths};
use crate::credentials::DatabaseCredentials;
use crate::database::{Database, MySqlDatabase};
use crate::exporter_config::ExporterConfig;
use crate::fixtures::Fixtures;
use crate::layout::{ExportLayout, ExportPackage};
use crate::stage::{AcceptanceContext, ExportStage};
use crate::storage::ObjectStore;
use crate::tool_runner::run_tool_checked;
use crate::tools::archive::UnzipArgs;
use crate::tools::exporter::ExporterArgs;
use crate::tools::gpg::{GpgDecryptArgs, GpgImportArgs};
use crate::tools::remote_task::RemoteTaskArgs;
use crate::tools::text::{DiffArgs, SortArgs};
use crate::workspace::Workspace;

/// What a successful run reports.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub durations: Vec<(ExportStage, Duration)>,
    /// Set when the workspace was kept for inspection.
    pub workspace: Option<PathBuf>,
}

/// Source of the current time; the package is named after the day the
/// exporter finished, not the day the run started.
pub type Clock = Box<dyn Fn() -> DateTime<Utc>>;

/// One acceptance run against a staging environment.
pub struct ExportAcceptance {
    settings: HarnessSettings,
    config: AcceptanceConfig,
    tools: ToolPaths,
    credentials: DatabaseCredentials,
    layout: ExportLayout,
    fixtures: Fixtures,
    workspace: Workspace,
    kept_workspace: Option<PathBuf>,
    store: Box<dyn ObjectStore>,
    database: Box<dyn Database>,
    clock: Clock,
}

impl ExportAcceptance {
    /// Setup: load credentials, derive names, create the workspace.
    pub fn new(
        settings: HarnessSettings,
        config: AcceptanceConfig,
        tools: ToolPaths,
        store: Box<dyn ObjectStore>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        settings.validate()?;
        let credentials = DatabaseCredentials::load(&config.credentials_file_url, store.as_ref())
            .with_context(|| {
                format!(
                    "Failed to load database credentials from {}",
                    config.credentials_file_url
                )
            })?;
        Self::with_credentials(settings, config, tools, credentials, store, now)
    }

    /// Setup with credentials already in hand.
    pub fn with_credentials(
        settings: HarnessSettings,
        config: AcceptanceConfig,
        tools: ToolPaths,
        credentials: DatabaseCredentials,
        store: Box<dyn ObjectStore>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let layout = ExportLayout::new(&settings, &config, now);
        let fixtures = Fixtures::new(settings.fixtures_dir.clone());
        let mut workspace = Workspace::create().context("Failed to create workspace")?;
        let kept_workspace = settings.keep_workspace.then(|| workspace.keep());

        info!(
            "Acceptance run '{}' for {} (external prefix {})",
            config.identifier, settings.course_id, layout.external_prefix
        );

        Ok(Self {
            settings,
            config,
            tools,
            credentials,
            layout,
            fixtures,
            workspace,
            kept_workspace,
            store,
            database: Box::new(MySqlDatabase),
            clock: Box::new(Utc::now),
        })
    }

    /// Seed through `database` instead of a MySQL server.
    pub fn with_database(mut self, database: Box<dyn Database>) -> Self {
        self.database = database;
        self
    }

    /// Take the time from `clock` instead of the system.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn layout(&self) -> &ExportLayout {
        &self.layout
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run every stage in order, stopping at the first failure.
    pub fn run(&self) -> Result<RunSummary> {
        self.fixtures
            .verify(&self.settings.table, &self.layout.exported_filename)?;

        let mut ctx = AcceptanceContext::new();
        for &stage in ExportStage::work_stages() {
            ctx.advance_to(stage)?;
            if let Err(err) = self.run_stage(stage) {
                ctx.fail()?;
                return Err(err.context(format!("Stage '{}' failed", stage)));
            }
        }
        ctx.advance_to(ExportStage::Completed)?;

        Ok(RunSummary {
            durations: ctx.durations().to_vec(),
            workspace: self.kept_workspace.clone(),
        })
    }

    fn run_stage(&self, stage: ExportStage) -> Result<()> {
        match stage {
            ExportStage::EnsuringDatabase => self.ensure_database_exists(),
            ExportStage::LoadingFixtureData => self.load_data_from_file(),
            ExportStage::RunningExportTask => self.run_export_task(),
            ExportStage::DownloadingTaskOutput => self.download_task_output().map(|_| ()),
            ExportStage::RunningLegacyExporter => self.run_legacy_exporter(),
            ExportStage::ValidatingExporterOutput => self.validate_exporter_output(),
            ExportStage::NotStarted | ExportStage::Completed | ExportStage::Failed => Ok(()),
        }
    }

    /// Create the testing database on the server if it doesn't exist.
    pub fn ensure_database_exists(&self) -> Result<()> {
        self.database.ensure_database_exists(&self.credentials)?;
        Ok(())
    }

    /// External effect: drops the source table and reloads it from the
    /// fixture file.
    pub fn load_data_from_file(&self) -> Result<()> {
        let path = self.fixtures.load_sql(&self.settings.table);
        let count = self.database.execute_sql_file(&self.credentials, &path)?;
        info!("Loaded {} statement(s) into {}", count, self.credentials.database);
        Ok(())
    }

    pub fn remote_task_args(&self) -> RemoteTaskArgs {
        RemoteTaskArgs {
            executable: self.tools.remote_task.clone(),
            job_flow_name: self.config.job_flow_name.clone(),
            branch: self.config.tasks_branch.clone(),
            remote_name: self.config.identifier.clone(),
            log_path: self.config.tasks_log_path.clone(),
            user: self.config.connection_user.clone(),
            workflow: self.settings.workflow.clone(),
            credentials: self.config.credentials_file_url.clone(),
            dump_root: self.layout.intermediate_root(),
            output_root: self.layout.task_output_root.clone(),
            output_suffix: self.settings.environment.clone(),
            num_mappers: self.settings.num_mappers,
            n_reduce_tasks: self.settings.num_reducers,
        }
    }

    /// Preconditions: populated source table.
    /// External effect: the workflow writes the full table, all courses
    /// interleaved, under `<root>/intermediate/` and the single per-course
    /// file to `<root>/<exported_filename>`.
    pub fn run_export_task(&self) -> Result<()> {
        run_tool_checked(&self.remote_task_args(), "Export workflow")?;
        Ok(())
    }

    /// Preconditions: the per-course file exists in S3.
    /// External effect: it is downloaded to `external/<day>/`, where the
    /// exporter picks up externally generated files.
    pub fn download_task_output(&self) -> Result<PathBuf> {
        let location = self.layout.task_output_location()?;
        if !self.store.lookup(&location)? {
            anyhow::bail!(
                "Expected output from {} not found. Url = {}",
                self.settings.workflow,
                self.layout.task_output_url()
            );
        }
        let local_dir = self
            .workspace
            .ensure_dir(self.workspace.external_prefix_dir(&self.layout.external_prefix))?;
        let dest = local_dir.join(&self.layout.exported_filename);
        self.store.download(&location, &dest)?;
        Ok(dest)
    }

    pub fn exporter_config(&self) -> ExporterConfig {
        ExporterConfig::new(
            &self.settings,
            &self.credentials,
            &self.layout.org_id,
            &self.workspace.external_files_dir(),
        )
    }

    pub fn exporter_args(&self) -> ExporterArgs {
        ExporterArgs {
            executable: self.tools.exporter.clone(),
            work_dir: self.workspace.working_dir(),
            bucket: self.config.exporter_output_bucket.clone(),
            course_id: self.settings.course_id.clone(),
            external_prefix: self.layout.external_prefix.clone(),
            output_prefix: self.layout.output_prefix.clone(),
            config_file: self.workspace.exporter_config_path(),
            environment: self.settings.environment.clone(),
            org: self.layout.org_id.clone(),
            task: self.settings.exporter_task.clone(),
        }
    }

    /// Preconditions: the task output sits in the external files dir.
    /// External effect: the exporter assembles the package, encrypts it and
    /// uploads `<output_prefix><org>-<date>.zip`.
    pub fn run_legacy_exporter(&self) -> Result<()> {
        self.exporter_config()
            .write_to(&self.workspace.exporter_config_path())?;
        // The exporter expects this directory to already exist.
        self.workspace.ensure_dir(self.workspace.course_data_dir())?;
        run_tool_checked(&self.exporter_args(), "Legacy exporter")?;
        Ok(())
    }

    /// The package the exporter uploads when it finishes now.
    pub fn expected_package(&self) -> ExportPackage {
        self.layout.package((self.clock)())
    }

    /// Preconditions: the package was uploaded.
    /// Downloads it, unpacks it, decrypts the course file and compares it
    /// with the expected output, ignoring record order.
    pub fn validate_exporter_output(&self) -> Result<()> {
        let validation_dir = self.workspace.ensure_dir(self.workspace.validation_dir())?;

        let package = self.expected_package();
        if !self.store.lookup(&package.location)? {
            anyhow::bail!(
                "Expected output from legacy exporter not found. Url = {}",
                package.location
            );
        }
        let archive_path = validation_dir.join(&package.archive_filename);
        self.store.download(&package.location, &archive_path)?;

        run_tool_checked(
            &UnzipArgs {
                program: self.settings.unzip_program.clone(),
                archive: archive_path,
                dest: validation_dir.clone(),
            },
            "Unpacking exporter archive",
        )?;

        let gpg_dir = self.workspace.ensure_gnupg_dir()?;
        run_tool_checked(
            &GpgImportArgs {
                program: self.settings.gpg_program.clone(),
                homedir: gpg_dir.clone(),
                key_file: self.settings.secret_key_file.clone(),
            },
            "Importing decryption key",
        )?;

        let exported_file_path = validation_dir.join(&self.layout.exported_filename);
        let encrypted = validation_dir
            .join(&package.export_id)
            .join(self.layout.encrypted_filename());
        if !encrypted.is_file() {
            anyhow::bail!(
                "Package does not contain {}",
                encrypted
                    .strip_prefix(&validation_dir)
                    .unwrap_or(&encrypted)
                    .display()
            );
        }
        run_tool_checked(
            &GpgDecryptArgs {
                program: self.settings.gpg_program.clone(),
                homedir: gpg_dir,
                output: exported_file_path.clone(),
                encrypted,
            },
            "Decrypting exported file",
        )?;

        compare_sorted(
            &exported_file_path,
            &validation_dir.join(self.layout.sorted_filename()),
            &self
                .fixtures
                .expected_output(&self.layout.exported_filename),
        )
    }
}

/// Sort `actual` into `sorted` and require it to match `expected` exactly.
pub fn compare_sorted(actual: &Path, sorted: &Path, expected: &Path) -> Result<()> {
    run_tool_checked(
        &SortArgs {
            input: actual.to_path_buf(),
            output: sorted.to_path_buf(),
        },
        "Sorting exported file",
    )?;
    run_tool_checked(
        &DiffArgs {
            actual: sorted.to_path_buf(),
            expected: expected.to_path_buf(),
        },
        "Comparing export with expected output",
    )?;
    info!("Exported data matches {}", expected.display());
    Ok(())
}
