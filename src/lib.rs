//! Export Acceptance Library
//!
//! End-to-end acceptance harness for the course research data export:
//! seeds MySQL from a fixture, runs the export workflow, hands its output to
//! the legacy exporter and checks the encrypted package it uploads.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod database;
pub mod error;
pub mod exporter_config;
pub mod fixtures;
pub mod layout;
pub mod pipeline;
pub mod process_guard;
pub mod sanity;
pub mod stage;
pub mod storage;
pub mod target;
pub mod tool_runner;
pub mod tool_traits;
pub mod tools;
pub mod workspace;

// Re-export main types for convenience
pub use config::{AcceptanceConfig, HarnessSettings, ToolPaths};
pub use credentials::DatabaseCredentials;
pub use error::{HarnessError, Result};
pub use layout::ExportLayout;
pub use pipeline::{ExportAcceptance, RunSummary};
pub use process_guard::{ChildRegistry, CommandProcessGroup, RegisteredChild};
pub use stage::{AcceptanceContext, ExportStage, StageTransitionError};
pub use storage::{ObjectStore, S3ObjectStore, S3StoreConfig};
pub use target::{S3Location, Target};
pub use tool_runner::{ToolOutput, run_tool, run_tool_checked};
pub use tool_traits::ToolArgs;
