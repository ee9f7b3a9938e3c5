//! Database connection parameters.
//!
//! The acceptance config points at a JSON file (local or S3) holding the
//! MySQL connection details shared with the export workflow.

use std::fmt;

use serde::Deserialize;
use tracing::debug;

use crate::error::{HarnessError, Result};
use crate::storage::ObjectStore;
use crate::target::Target;

fn default_port() -> u16 {
    3306
}

/// MySQL connection parameters.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseCredentials {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl DatabaseCredentials {
    /// Parse the credentials JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let credentials: Self = serde_json::from_str(json)?;
        credentials.validate()?;
        Ok(credentials)
    }

    /// Retrieve connection parameters from a URL.
    pub fn load(url: &str, store: &dyn ObjectStore) -> Result<Self> {
        debug!("Loading database credentials from {}", url);
        let target = Target::parse(url)?;
        let text = target.read_to_string(store)?;
        Self::from_json(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(HarnessError::config("credentials host must be specified"));
        }
        if self.username.trim().is_empty() {
            return Err(HarnessError::config(
                "credentials username must be specified",
            ));
        }
        validate_identifier(&self.database)
    }
}

/// Database names are interpolated into DDL, so only plain identifiers pass.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 {
        return Err(HarnessError::validation(format!(
            "database name '{}' must be 1-64 characters",
            name
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    {
        return Err(HarnessError::validation(format!(
            "database name '{}' may only contain letters, digits, '_' and '$'",
            name
        )));
    }
    Ok(())
}
