//! Configuration file consumed by the legacy exporter.
//!
//! ```yaml
//! options: {}
//! defaults:
//!   gpg_keys: gpg-keys
//!   sql_user: <username>
//!   sql_db: <database>
//!   sql_password: <password>
//! environments:
//!   <environment>:
//!     name: <environment>-analytics
//!     sql_host: <host>
//!     external_files: <workspace>/external
//! organizations:
//!   <org_id>:
//!     recipient: daemon@edx.org
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::HarnessSettings;
use crate::credentials::DatabaseCredentials;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExporterConfig {
    pub options: BTreeMap<String, String>,
    pub defaults: ExporterDefaults,
    pub environments: BTreeMap<String, ExporterEnvironment>,
    pub organizations: BTreeMap<String, ExporterOrganization>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExporterDefaults {
    pub gpg_keys: String,
    pub sql_user: String,
    pub sql_db: String,
    pub sql_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExporterEnvironment {
    pub name: String,
    pub sql_host: String,
    pub external_files: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExporterOrganization {
    pub recipient: String,
}

impl ExporterConfig {
    pub fn new(
        settings: &HarnessSettings,
        credentials: &DatabaseCredentials,
        org_id: &str,
        external_files: &Path,
    ) -> Self {
        let mut environments = BTreeMap::new();
        environments.insert(
            settings.environment.clone(),
            ExporterEnvironment {
                name: format!("{}-analytics", settings.environment),
                sql_host: credentials.host.clone(),
                external_files: external_files.display().to_string(),
            },
        );

        let mut organizations = BTreeMap::new();
        organizations.insert(
            org_id.to_string(),
            ExporterOrganization {
                recipient: settings.recipient.clone(),
            },
        );

        Self {
            options: BTreeMap::new(),
            defaults: ExporterDefaults {
                gpg_keys: settings.gpg_keys_dir.clone(),
                sql_user: credentials.username.clone(),
                sql_db: credentials.database.clone(),
                sql_password: credentials.password.clone(),
            },
            environments,
            organizations,
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_yaml()?)?;
        info!("Wrote exporter configuration to {}", path.display());
        Ok(())
    }
}
