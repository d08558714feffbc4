use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{OverallStatus, RiskLevel, RunStatus, StepStatus, VerifyStatus};

/// Machine-readable decision and failure reasons recorded per step.
pub mod reasons {
    pub const APPROVED_BY_ID: &str = "approved-by-id";
    pub const MISSING_LOW: &str = "missing-low-approval";
    pub const MISSING_MEDIUM: &str = "missing-medium-approval";
    pub const MISSING_HIGH: &str = "missing-high-approval";
    pub const UNRECOGNIZED_RISK: &str = "unrecognized-risk-needs-approval";
    pub const UNCONFIRMED_LOW_CONFIDENCE: &str = "unconfirmed-low-confidence";

    pub const NONZERO_EXIT: &str = "nonzero-exit";
    pub const VERIFY_FAILED: &str = "verify-failed";
    pub const TIMEOUT: &str = "timeout";
    pub const SPAWN_ERROR: &str = "spawn-error";
    /// The change log stopped accepting entries; later steps are not started.
    pub const JOURNAL_WRITE_FAILED: &str = "journal-write-failed";

    /// `approve-all-low`, `approve-all-medium`, `approve-all-high`.
    pub fn approve_all(risk: &str) -> String {
        format!("approve-all-{risk}")
    }
}

/// One entry per attempted or skipped step. Written once, never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub step_id: String,
    pub status: StepStatus,
    pub risk_level: RiskLevel,
    /// Why the approval gate approved or skipped the step.
    pub decision_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_status: Option<VerifyStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_return_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_stderr: Option<String>,
}

impl ExecutionRecord {
    /// True when the primary command ran and produced an exit status.
    ///
    /// Skipped steps, spawn errors and steps cut off by the run budget have
    /// no return code.
    pub fn was_executed(&self) -> bool {
        self.return_code.is_some()
    }
}

/// Why a step did not run (or did not complete successfully).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotExecuted {
    pub step_id: String,
    pub reason: String,
}

/// Run-level aggregate of one execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub total_steps: usize,
    pub executed_steps: usize,
    pub skipped_steps: usize,
    pub failed_steps: usize,
    pub verified_steps: usize,
    pub overall_status: OverallStatus,
    pub requires_human_confirmation: bool,
    pub run_status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub not_executed: Vec<NotExecuted>,
    /// Set when the change log failed mid-run; the run then counts as failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_error: Option<String>,
}

impl Summary {
    pub fn tally(
        records: &[ExecutionRecord],
        overall_status: OverallStatus,
        requires_human_confirmation: bool,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let executed_steps = records.iter().filter(|r| r.was_executed()).count();
        let skipped_steps = records
            .iter()
            .filter(|r| r.status == StepStatus::Skipped)
            .count();
        let failed_steps = records
            .iter()
            .filter(|r| r.status == StepStatus::Failed)
            .count();
        let verified_steps = records
            .iter()
            .filter(|r| r.verify_status == Some(VerifyStatus::Verified))
            .count();
        let not_executed = records
            .iter()
            .filter(|r| !r.was_executed())
            .map(|r| NotExecuted {
                step_id: r.step_id.clone(),
                reason: r
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| r.decision_reason.clone()),
            })
            .collect();
        let run_status = if failed_steps > 0 {
            RunStatus::Failure
        } else {
            RunStatus::Success
        };
        Self {
            total_steps: records.len(),
            executed_steps,
            skipped_steps,
            failed_steps,
            verified_steps,
            overall_status,
            requires_human_confirmation,
            run_status,
            started_at,
            finished_at,
            not_executed,
            journal_error: None,
        }
    }

    /// Record a change-log failure. The run can no longer report success.
    pub fn with_journal_error(mut self, error: impl ToString) -> Self {
        self.journal_error = Some(error.to_string());
        self.run_status = RunStatus::Failure;
        self
    }
}

/// The persisted audit artifact (`execution-log.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub summary: Summary,
    pub records: Vec<ExecutionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, status: StepStatus, rc: Option<i32>, failure: Option<&str>) -> ExecutionRecord {
        let now = Utc::now();
        ExecutionRecord {
            step_id: id.into(),
            status,
            risk_level: RiskLevel::Low,
            decision_reason: reasons::approve_all("low"),
            failure_reason: failure.map(String::from),
            started_at: now,
            finished_at: now,
            return_code: rc,
            stdout: String::new(),
            stderr: String::new(),
            verify_command: None,
            verify_status: None,
            verify_return_code: None,
            verify_stdout: None,
            verify_stderr: None,
        }
    }

    #[test]
    fn tally_counts_and_explains() {
        let mut skipped = record("step-002", StepStatus::Skipped, None, None);
        skipped.decision_reason = reasons::MISSING_HIGH.into();
        let records = vec![
            record("step-001", StepStatus::Success, Some(0), None),
            skipped,
            record("step-003", StepStatus::Failed, None, Some(reasons::TIMEOUT)),
        ];
        let now = Utc::now();
        let s = Summary::tally(&records, OverallStatus::NeedsAdjustments, false, now, now);
        assert_eq!(s.total_steps, 3);
        assert_eq!(s.executed_steps, 1);
        assert_eq!(s.skipped_steps, 1);
        assert_eq!(s.failed_steps, 1);
        assert_eq!(s.run_status, RunStatus::Failure);
        assert_eq!(
            s.not_executed,
            vec![
                NotExecuted { step_id: "step-002".into(), reason: reasons::MISSING_HIGH.into() },
                NotExecuted { step_id: "step-003".into(), reason: reasons::TIMEOUT.into() },
            ]
        );
    }

    #[test]
    fn all_skipped_is_success() {
        let records = vec![record("step-001", StepStatus::Skipped, None, None)];
        let now = Utc::now();
        let s = Summary::tally(&records, OverallStatus::Ready, false, now, now);
        assert_eq!(s.run_status, RunStatus::Success);
        assert_eq!(s.executed_steps, 0);
    }
}
