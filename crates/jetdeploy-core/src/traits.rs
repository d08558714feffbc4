use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ExecError, JournalError};
use crate::spec::execution::{ExecutionRecord, Summary};

/// Captured result of one shell invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// The per-command timeout fired before the process finished.
    pub timed_out: bool,
}

impl CommandOutcome {
    pub fn succeeded(&self) -> bool {
        self.return_code == 0 && !self.timed_out
    }
}

/// Runs a command string to completion. Blocking; one command at a time.
pub trait CommandRunner {
    fn run(&self, command: &str) -> Result<CommandOutcome, ExecError>;
}

/// Approval decision as written to the change log, ahead of the step's execution entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalEntry {
    pub step_id: String,
    pub risk_level: String,
    pub approved: bool,
    pub reason: String,
    pub ts: DateTime<Utc>,
}

/// Receives the execution change log for persistence.
pub trait ExecutionJournal {
    fn log_approval(&self, entry: &ApprovalEntry) -> Result<(), JournalError>;
    fn log_execution(&self, record: &ExecutionRecord) -> Result<(), JournalError>;
    fn log_summary(&self, summary: &Summary) -> Result<(), JournalError>;
}

/// Journal that drops everything. Used when no change log path is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullJournal;

impl ExecutionJournal for NullJournal {
    fn log_approval(&self, _entry: &ApprovalEntry) -> Result<(), JournalError> {
        Ok(())
    }

    fn log_execution(&self, _record: &ExecutionRecord) -> Result<(), JournalError> {
        Ok(())
    }

    fn log_summary(&self, _summary: &Summary) -> Result<(), JournalError> {
        Ok(())
    }
}
