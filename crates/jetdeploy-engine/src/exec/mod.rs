//! Guided Execution Engine.

pub mod approval;
pub mod engine;

pub use approval::should_run;
pub use engine::execute;

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::Duration;

    use jetdeploy_core::errors::{ExecError, JournalError};
    use jetdeploy_core::spec::approvals::ApprovalPolicy;
    use jetdeploy_core::spec::execution::{ExecutionRecord, Summary};
    use jetdeploy_core::spec::plan::{Plan, PlanStep};
    use jetdeploy_core::traits::{
        ApprovalEntry, CommandOutcome, CommandRunner, ExecutionJournal, NullJournal,
    };
    use jetdeploy_core::types::{OverallStatus, PlanMode, RiskLevel, RunStatus, StepStatus, VerifyStatus};
    use serde_json::json;

    use super::execute;
    use crate::config::ExecutionOptions;
    use crate::journal::{verify_chain, JsonlJournal};

    /// Exit codes by command; unknown commands succeed. Records call order.
    #[derive(Default)]
    struct ScriptedRunner {
        codes: HashMap<String, i32>,
        spawn_fails: Vec<String>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedRunner {
        fn exit(mut self, command: &str, code: i32) -> Self {
            self.codes.insert(command.into(), code);
            self
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, command: &str) -> Result<CommandOutcome, ExecError> {
            self.calls.borrow_mut().push(command.to_string());
            if self.spawn_fails.iter().any(|c| c == command) {
                return Err(ExecError::Spawn("no such shell".into()));
            }
            let return_code = self.codes.get(command).copied().unwrap_or(0);
            Ok(CommandOutcome {
                return_code,
                stdout: format!("ran {command}"),
                stderr: String::new(),
                timed_out: return_code == 124,
            })
        }
    }

    #[derive(Default)]
    struct RecordingJournal {
        events: RefCell<Vec<String>>,
    }

    impl ExecutionJournal for RecordingJournal {
        fn log_approval(&self, entry: &ApprovalEntry) -> Result<(), JournalError> {
            self.events.borrow_mut().push(format!("approval:{}", entry.step_id));
            Ok(())
        }

        fn log_execution(&self, record: &ExecutionRecord) -> Result<(), JournalError> {
            self.events.borrow_mut().push(format!("execution:{}", record.step_id));
            Ok(())
        }

        fn log_summary(&self, _summary: &Summary) -> Result<(), JournalError> {
            self.events.borrow_mut().push("summary".into());
            Ok(())
        }
    }

    /// Accepts `limit` execution records, then rejects them.
    struct FailingJournal {
        reject_approvals: bool,
        limit: usize,
        executions: RefCell<usize>,
    }

    impl FailingJournal {
        fn new(reject_approvals: bool, limit: usize) -> Self {
            Self {
                reject_approvals,
                limit,
                executions: RefCell::new(0),
            }
        }
    }

    impl ExecutionJournal for FailingJournal {
        fn log_approval(&self, _entry: &ApprovalEntry) -> Result<(), JournalError> {
            if self.reject_approvals {
                return Err(JournalError::WriteFailure("disk full".into()));
            }
            Ok(())
        }

        fn log_execution(&self, _record: &ExecutionRecord) -> Result<(), JournalError> {
            let mut n = self.executions.borrow_mut();
            if *n >= self.limit {
                return Err(JournalError::WriteFailure("disk full".into()));
            }
            *n += 1;
            Ok(())
        }

        fn log_summary(&self, _summary: &Summary) -> Result<(), JournalError> {
            Err(JournalError::WriteFailure("disk full".into()))
        }
    }

    fn step(id: &str, risk: RiskLevel, command: &str, verify: Option<&str>) -> PlanStep {
        let mut step: PlanStep = serde_json::from_value(json!({
            "id": id,
            "command": command,
            "rollback_hint": "none",
        }))
        .unwrap();
        step.risk_level = risk;
        step.verify_command = verify.map(String::from);
        step
    }

    fn plan(steps: Vec<PlanStep>) -> Plan {
        Plan {
            mode: PlanMode::Guided,
            overall_status: OverallStatus::NeedsAdjustments,
            allow_sudo: true,
            requires_human_confirmation: false,
            steps,
            manual_prerequisites: vec![],
        }
    }

    #[test]
    fn default_policy_runs_low_and_skips_high() {
        let plan = plan(vec![
            step("step-001", RiskLevel::Low, "echo low", None),
            step("step-002", RiskLevel::High, "install-driver", None),
        ]);
        let runner = ScriptedRunner::default();
        let log = execute(
            &plan,
            &ApprovalPolicy::default(),
            &runner,
            &NullJournal,
            &ExecutionOptions::default(),
        );

        assert_eq!(log.records[0].status, StepStatus::Success);
        assert_eq!(log.records[1].status, StepStatus::Skipped);
        assert_eq!(log.records[1].decision_reason, "missing-high-approval");
        assert_eq!(log.summary.executed_steps, 1);
        assert_eq!(log.summary.skipped_steps, 1);
        assert_eq!(log.summary.failed_steps, 0);
        assert_eq!(log.summary.run_status, RunStatus::Success);
        assert_eq!(runner.calls.borrow().as_slice(), ["echo low"]);
        assert_eq!(log.summary.not_executed[0].reason, "missing-high-approval");
    }

    #[test]
    fn failed_verification_fails_the_step() {
        let plan = plan(vec![step("step-001", RiskLevel::Low, "install", Some("check"))]);
        let runner = ScriptedRunner::default().exit("check", 1);
        let log = execute(
            &plan,
            &ApprovalPolicy::default(),
            &runner,
            &NullJournal,
            &ExecutionOptions::default(),
        );

        let record = &log.records[0];
        assert_eq!(record.return_code, Some(0));
        assert_eq!(record.status, StepStatus::Failed);
        assert_eq!(record.verify_status, Some(VerifyStatus::VerifyFailed));
        assert_eq!(record.failure_reason.as_deref(), Some("verify-failed"));
        assert_eq!(log.summary.failed_steps, 1);
        assert_eq!(log.summary.verified_steps, 0);
        assert_eq!(log.summary.run_status, RunStatus::Failure);
    }

    #[test]
    fn failures_do_not_stop_later_steps() {
        let plan = plan(vec![
            step("step-001", RiskLevel::Low, "broken", Some("never")),
            step("step-002", RiskLevel::Low, "fine", Some("check")),
        ]);
        let runner = ScriptedRunner::default().exit("broken", 2);
        let log = execute(
            &plan,
            &ApprovalPolicy::default(),
            &runner,
            &NullJournal,
            &ExecutionOptions::default(),
        );

        assert_eq!(log.records[0].failure_reason.as_deref(), Some("nonzero-exit"));
        assert_eq!(log.records[0].verify_status, None);
        assert_eq!(log.records[1].verify_status, Some(VerifyStatus::Verified));
        assert_eq!(runner.calls.borrow().as_slice(), ["broken", "fine", "check"]);
        assert!(log.records[0].finished_at <= log.records[1].started_at);
    }

    #[test]
    fn timeout_and_spawn_errors_are_recorded() {
        let plan = plan(vec![
            step("step-001", RiskLevel::Low, "sleep 99", None),
            step("step-002", RiskLevel::Low, "nope", None),
        ]);
        let mut runner = ScriptedRunner::default().exit("sleep 99", 124);
        runner.spawn_fails.push("nope".into());
        let log = execute(
            &plan,
            &ApprovalPolicy::default(),
            &runner,
            &NullJournal,
            &ExecutionOptions::default(),
        );

        assert_eq!(log.records[0].failure_reason.as_deref(), Some("timeout"));
        assert_eq!(log.records[1].failure_reason.as_deref(), Some("spawn-error"));
        assert_eq!(log.records[1].return_code, None);
        assert_eq!(log.summary.failed_steps, 2);
        assert_eq!(log.summary.executed_steps, 1);
    }

    #[test]
    fn exhausted_budget_never_starts_steps() {
        let plan = plan(vec![
            step("step-001", RiskLevel::Low, "a", None),
            step("step-002", RiskLevel::Low, "b", None),
        ]);
        let runner = ScriptedRunner::default();
        let options = ExecutionOptions {
            command_timeout: None,
            run_budget: Some(Duration::ZERO),
        };
        let log = execute(&plan, &ApprovalPolicy::default(), &runner, &NullJournal, &options);

        assert!(runner.calls.borrow().is_empty());
        assert!(log
            .records
            .iter()
            .all(|r| r.status == StepStatus::Failed && r.failure_reason.as_deref() == Some("timeout")));
    }

    #[test]
    fn low_confidence_plan_needs_confirmation() {
        let mut p = plan(vec![step("step-001", RiskLevel::Low, "echo hi", None)]);
        p.requires_human_confirmation = true;
        let runner = ScriptedRunner::default();

        let log = execute(&p, &ApprovalPolicy::default(), &runner, &NullJournal, &ExecutionOptions::default());
        assert_eq!(log.records[0].decision_reason, "unconfirmed-low-confidence");
        assert!(log.summary.requires_human_confirmation);
        assert!(runner.calls.borrow().is_empty());

        let policy = ApprovalPolicy {
            confirm_low_confidence: true,
            ..ApprovalPolicy::default()
        };
        let log = execute(&p, &policy, &runner, &NullJournal, &ExecutionOptions::default());
        assert_eq!(log.summary.executed_steps, 1);
    }

    #[test]
    fn approval_is_journaled_before_execution() {
        let plan = plan(vec![
            step("step-001", RiskLevel::Low, "a", None),
            step("step-002", RiskLevel::Medium, "b", None),
        ]);
        let journal = RecordingJournal::default();
        execute(
            &plan,
            &ApprovalPolicy::default(),
            &ScriptedRunner::default(),
            &journal,
            &ExecutionOptions::default(),
        );

        assert_eq!(
            journal.events.borrow().as_slice(),
            [
                "approval:step-001",
                "execution:step-001",
                "approval:step-002",
                "execution:step-002",
                "summary"
            ]
        );
    }

    #[test]
    fn repeated_runs_give_identical_counts() {
        let plan = plan(vec![
            step("step-001", RiskLevel::Low, "a", Some("v")),
            step("step-002", RiskLevel::Medium, "b", None),
            step("step-003", RiskLevel::Unrecognized, "c", None),
        ]);
        let runner = ScriptedRunner::default().exit("v", 3);
        let run = || {
            execute(&plan, &ApprovalPolicy::default(), &runner, &NullJournal, &ExecutionOptions::default())
                .summary
        };
        let (a, b) = (run(), run());
        assert_eq!(
            (a.executed_steps, a.skipped_steps, a.failed_steps),
            (b.executed_steps, b.skipped_steps, b.failed_steps)
        );
        assert_eq!((a.executed_steps, a.skipped_steps, a.failed_steps), (1, 2, 1));
    }

    #[test]
    fn journal_failure_keeps_every_record() {
        let plan = plan(vec![
            step("step-001", RiskLevel::Low, "a", None),
            step("step-002", RiskLevel::Low, "b", None),
            step("step-003", RiskLevel::Low, "c", None),
        ]);
        let runner = ScriptedRunner::default();
        let journal = FailingJournal::new(false, 1);
        let log = execute(
            &plan,
            &ApprovalPolicy::default(),
            &runner,
            &journal,
            &ExecutionOptions::default(),
        );

        // both commands that touched the device are in the log
        assert_eq!(runner.calls.borrow().as_slice(), ["a", "b"]);
        assert_eq!(log.records.len(), 3);
        assert_eq!(log.records[1].status, StepStatus::Success);
        assert_eq!(log.records[2].status, StepStatus::Skipped);
        assert_eq!(log.records[2].decision_reason, "journal-write-failed");
        assert_eq!(log.summary.executed_steps, 2);
        assert_eq!(log.summary.run_status, RunStatus::Failure);
        assert!(log.summary.journal_error.as_deref().unwrap().contains("disk full"));
    }

    #[test]
    fn rejected_approval_stops_before_running() {
        let plan = plan(vec![
            step("step-001", RiskLevel::Low, "a", None),
            step("step-002", RiskLevel::Low, "b", None),
        ]);
        let runner = ScriptedRunner::default();
        let journal = FailingJournal::new(true, 0);
        let log = execute(
            &plan,
            &ApprovalPolicy::default(),
            &runner,
            &journal,
            &ExecutionOptions::default(),
        );

        assert!(runner.calls.borrow().is_empty());
        assert!(log
            .records
            .iter()
            .all(|r| r.decision_reason == "journal-write-failed" && r.status == StepStatus::Skipped));
        assert!(log.summary.journal_error.is_some());
    }

    #[test]
    fn second_run_never_extends_the_first_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.journal.jsonl");
        let plan = plan(vec![step("step-001", RiskLevel::Low, "a", None)]);
        execute(
            &plan,
            &ApprovalPolicy::default(),
            &ScriptedRunner::default(),
            &JsonlJournal::create(&path).unwrap(),
            &ExecutionOptions::default(),
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 3);

        assert!(matches!(
            JsonlJournal::create(&path),
            Err(JournalError::AlreadyExists(_))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 3);
    }

    #[test]
    fn jsonl_journal_chain_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.journal.jsonl");
        let plan = plan(vec![
            step("step-001", RiskLevel::Low, "a", None),
            step("step-002", RiskLevel::High, "b", None),
        ]);
        execute(
            &plan,
            &ApprovalPolicy::default(),
            &ScriptedRunner::default(),
            &JsonlJournal::create(&path).unwrap(),
            &ExecutionOptions::default(),
        );

        let report = verify_chain(&path).unwrap();
        assert_eq!(report.approvals, 2);
        assert_eq!(report.executions, 2);
        assert!(report.has_summary);
    }
}
