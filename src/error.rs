//! Error handling module for the export acceptance harness
//!
//! Provides the typed failures raised by the library layers (configuration,
//! naming, storage, database). Orchestration code wraps these with `anyhow`
//! context so the binary can print the whole cause chain.

use thiserror::Error;

use crate::stage::StageTransitionError;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum HarnessError {
    /// IO errors (workspace, fixtures, downloaded files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization errors (exporter config)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required keys absent from the acceptance config blob
    #[error("Configuration is missing required keys: {}", .0.join(", "))]
    MissingConfigKeys(Vec<&'static str>),

    /// Required environment variable is not set
    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),

    /// Malformed or unsupported URL
    #[error("Invalid URL {url}: {reason}")]
    Url { url: String, reason: String },

    /// Object expected in S3 does not exist
    #[error("Object not found: {url}")]
    ObjectNotFound { url: String },

    /// S3 request failures other than a missing object
    #[error("Storage error: {0}")]
    Storage(String),

    /// MySQL connection or statement errors
    #[error("Database error: {0}")]
    Database(String),

    /// Validation errors (identifiers, fixtures, output comparison)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Stage machine transition errors
    #[error("Stage transition error: {0}")]
    StageTransition(#[from] StageTransitionError),
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

// Convenient error constructors
impl HarnessError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a URL error
    pub fn url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Url {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<mysql::Error> for HarnessError {
    fn from(err: mysql::Error) -> Self {
        Self::Database(err.to_string())
    }
}
