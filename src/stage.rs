//! Run stage machine
//!
//! The acceptance run is a fixed, linear sequence. `AcceptanceContext` owns
//! the current stage and only allows moving to the next one, so no step can
//! run before its preconditions were produced by the step before it.
//!
//! # Stage Flow
//!
//! ```text
//! NotStarted
//!     ↓
//! EnsuringDatabase
//!     ↓
//! LoadingFixtureData
//!     ↓
//! RunningExportTask
//!     ↓
//! DownloadingTaskOutput
//!     ↓
//! RunningLegacyExporter
//!     ↓
//! ValidatingExporterOutput
//!     ↓
//! Completed
//!
//! (Any non-terminal stage can transition to Failed)
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info};

/// Stages of one acceptance run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ExportStage {
    NotStarted = 0,
    /// Create the test database if needed
    EnsuringDatabase = 1,
    /// Drop and reload the source table from the fixture
    LoadingFixtureData = 2,
    /// Run the export workflow on the job flow
    RunningExportTask = 3,
    /// Fetch the per-course file into the external files dir
    DownloadingTaskOutput = 4,
    /// Package, encrypt and upload with the legacy exporter
    RunningLegacyExporter = 5,
    /// Fetch, unpack, decrypt and compare the package
    ValidatingExporterOutput = 6,
    Completed = 7,
    Failed = 255,
}

impl ExportStage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::EnsuringDatabase),
            Self::EnsuringDatabase => Some(Self::LoadingFixtureData),
            Self::LoadingFixtureData => Some(Self::RunningExportTask),
            Self::RunningExportTask => Some(Self::DownloadingTaskOutput),
            Self::DownloadingTaskOutput => Some(Self::RunningLegacyExporter),
            Self::RunningLegacyExporter => Some(Self::ValidatingExporterOutput),
            Self::ValidatingExporterOutput => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::EnsuringDatabase => "ensure database exists",
            Self::LoadingFixtureData => "load fixture data",
            Self::RunningExportTask => "run export task",
            Self::DownloadingTaskOutput => "download task output",
            Self::RunningLegacyExporter => "run legacy exporter",
            Self::ValidatingExporterOutput => "validate exporter output",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// The stages that do work, in execution order.
    pub const fn work_stages() -> &'static [Self] {
        &[
            Self::EnsuringDatabase,
            Self::LoadingFixtureData,
            Self::RunningExportTask,
            Self::DownloadingTaskOutput,
            Self::RunningLegacyExporter,
            Self::ValidatingExporterOutput,
        ]
    }
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageTransitionError {
    #[error("Cannot skip from '{from}' to '{to}'")]
    SkippedStage { from: ExportStage, to: ExportStage },

    #[error("Cannot go backwards from '{from}' to '{to}'")]
    BackwardTransition { from: ExportStage, to: ExportStage },

    #[error("Cannot leave terminal stage '{from}'")]
    FromTerminalState { from: ExportStage },

    #[error("Already at stage '{stage}'")]
    AlreadyAtStage { stage: ExportStage },
}

/// Tracks the current stage and how long each finished stage took.
#[derive(Debug)]
pub struct AcceptanceContext {
    current: ExportStage,
    failed_at: Option<ExportStage>,
    entered_at: Instant,
    durations: Vec<(ExportStage, Duration)>,
}

impl Default for AcceptanceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AcceptanceContext {
    pub fn new() -> Self {
        Self {
            current: ExportStage::NotStarted,
            failed_at: None,
            entered_at: Instant::now(),
            durations: Vec::with_capacity(ExportStage::work_stages().len()),
        }
    }

    #[inline]
    pub fn current_stage(&self) -> ExportStage {
        self.current
    }

    #[inline]
    pub fn failed_at(&self) -> Option<ExportStage> {
        self.failed_at
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.current == ExportStage::Completed
    }

    /// Finished stages with their wall-clock durations.
    pub fn durations(&self) -> &[(ExportStage, Duration)] {
        &self.durations
    }

    /// Move to `target`, which must be the stage right after the current one.
    pub fn advance_to(&mut self, target: ExportStage) -> Result<(), StageTransitionError> {
        let from = self.current;
        if from.is_terminal() {
            return Err(StageTransitionError::FromTerminalState { from });
        }
        if target == from {
            return Err(StageTransitionError::AlreadyAtStage { stage: from });
        }
        if target.order() < from.order() {
            return Err(StageTransitionError::BackwardTransition { from, to: target });
        }
        if from.next() != Some(target) {
            return Err(StageTransitionError::SkippedStage { from, to: target });
        }

        self.finish_current();
        self.current = target;
        if target != ExportStage::Completed {
            info!(
                "Stage {}/{}: {}",
                target.order(),
                ExportStage::work_stages().len(),
                target
            );
        }
        Ok(())
    }

    /// Mark the current stage failed.
    pub fn fail(&mut self) -> Result<(), StageTransitionError> {
        if self.current.is_terminal() {
            return Err(StageTransitionError::FromTerminalState { from: self.current });
        }
        error!("Stage '{}' failed", self.current);
        self.finish_current();
        self.failed_at = Some(self.current);
        self.current = ExportStage::Failed;
        Ok(())
    }

    fn finish_current(&mut self) {
        let now = Instant::now();
        if self.current != ExportStage::NotStarted {
            self.durations
                .push((self.current, now.duration_since(self.entered_at)));
        }
        self.entered_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_through(ctx: &mut AcceptanceContext, until: ExportStage) {
        for &stage in ExportStage::work_stages() {
            ctx.advance_to(stage).unwrap();
            if stage == until {
                break;
            }
        }
    }

    #[test]
    fn test_full_sequence_completes() {
        let mut ctx = AcceptanceContext::new();
        run_through(&mut ctx, ExportStage::ValidatingExporterOutput);
        ctx.advance_to(ExportStage::Completed).unwrap();
        assert!(ctx.is_complete());
        assert_eq!(ctx.durations().len(), ExportStage::work_stages().len());
    }

    #[test]
    fn test_cannot_skip() {
        let mut ctx = AcceptanceContext::new();
        let err = ctx.advance_to(ExportStage::RunningExportTask).unwrap_err();
        assert_eq!(
            err,
            StageTransitionError::SkippedStage {
                from: ExportStage::NotStarted,
                to: ExportStage::RunningExportTask,
            }
        );
    }

    #[test]
    fn test_cannot_go_backwards_or_repeat() {
        let mut ctx = AcceptanceContext::new();
        run_through(&mut ctx, ExportStage::LoadingFixtureData);
        assert!(matches!(
            ctx.advance_to(ExportStage::EnsuringDatabase),
            Err(StageTransitionError::BackwardTransition { .. })
        ));
        assert!(matches!(
            ctx.advance_to(ExportStage::LoadingFixtureData),
            Err(StageTransitionError::AlreadyAtStage { .. })
        ));
    }

    #[test]
    fn test_fail_records_stage_and_is_terminal() {
        let mut ctx = AcceptanceContext::new();
        run_through(&mut ctx, ExportStage::DownloadingTaskOutput);
        ctx.fail().unwrap();
        assert_eq!(ctx.current_stage(), ExportStage::Failed);
        assert_eq!(ctx.failed_at(), Some(ExportStage::DownloadingTaskOutput));
        assert!(ctx.fail().is_err());
        assert!(matches!(
            ctx.advance_to(ExportStage::RunningLegacyExporter),
            Err(StageTransitionError::FromTerminalState { .. })
        ));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(
            ExportStage::ValidatingExporterOutput.to_string(),
            "validate exporter output"
        );
    }
}
