//! File and object naming for a single run.
//!
//! Everything here is derived from the settings, the config and a UTC
//! timestamp, so the names can be checked without touching any external
//! system. The day prefix is fixed when the run starts; the package name
//! uses the day the exporter actually ran, which can be later.

use chrono::{DateTime, Utc};

use crate::config::{AcceptanceConfig, HarnessSettings};
use crate::error::Result;
use crate::target::{S3Location, url_path_join};

/// Names and locations for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLayout {
    /// Course id with `/` replaced by `-`.
    pub safe_course_id: String,
    /// `<safe_course_id>-<table>-<environment>-analytics.sql`
    pub exported_filename: String,
    /// Lowercased first segment of the course id.
    pub org_id: String,
    /// Day of month, zero padded. Bounds intermediate storage to a month of
    /// history while keeping recent runs around for debugging.
    pub external_prefix: String,
    /// `<tasks_output_url>/<identifier>`
    pub task_output_root: String,
    /// `automation/<identifier>/`
    pub output_prefix: String,
    pub exporter_bucket: String,
}

/// Lowercased organization segment of an `org/course/run` course id.
pub fn org_id(course_id: &str) -> String {
    course_id.split('/').next().unwrap_or_default().to_lowercase()
}

/// Names of one uploaded package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPackage {
    /// `YYYY-MM-DD`
    pub export_date: String,
    /// `<org_id>-<export_date>`, also the directory name inside the archive.
    pub export_id: String,
    /// `<export_id>.zip`
    pub archive_filename: String,
    /// `s3://<exporter bucket>/<output_prefix><archive_filename>`
    pub location: S3Location,
}

impl ExportLayout {
    pub fn new(
        settings: &HarnessSettings,
        config: &AcceptanceConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let safe_course_id = settings.course_id.replace('/', "-");
        let exported_filename = format!(
            "{}-{}-{}-analytics.sql",
            safe_course_id, settings.table, settings.environment
        );
        let org_id = org_id(&settings.course_id);

        Self {
            safe_course_id,
            exported_filename,
            org_id,
            external_prefix: now.format("%d").to_string(),
            task_output_root: config.task_output_root(),
            output_prefix: config.output_prefix(),
            exporter_bucket: config.exporter_output_bucket.clone(),
        }
    }

    /// Where the workflow dumps the full, interleaved table.
    pub fn intermediate_root(&self) -> String {
        url_path_join(&self.task_output_root, &["intermediate"])
    }

    /// URL of the per-course file the workflow produces.
    pub fn task_output_url(&self) -> String {
        url_path_join(&self.task_output_root, &[&self.exported_filename])
    }

    pub fn task_output_location(&self) -> Result<S3Location> {
        S3Location::parse(&self.task_output_url())
    }

    /// The package the exporter stamps with the UTC day of `today`.
    pub fn package(&self, today: DateTime<Utc>) -> ExportPackage {
        let export_date = today.format("%Y-%m-%d").to_string();
        let export_id = format!("{}-{}", self.org_id, export_date);
        let archive_filename = format!("{}.zip", export_id);
        let location = S3Location::new(
            self.exporter_bucket.clone(),
            format!("{}{}", self.output_prefix, archive_filename),
        );
        ExportPackage {
            export_date,
            export_id,
            archive_filename,
            location,
        }
    }

    /// Encrypted file name inside the unpacked archive.
    pub fn encrypted_filename(&self) -> String {
        format!("{}.gpg", self.exported_filename)
    }

    pub fn sorted_filename(&self) -> String {
        format!("{}.sorted", self.exported_filename)
    }
}
