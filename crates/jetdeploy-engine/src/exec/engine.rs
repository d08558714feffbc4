use std::time::Instant;

use chrono::Utc;
use jetdeploy_core::errors::{ApprovalDecision, JournalError};
use jetdeploy_core::spec::approvals::ApprovalPolicy;
use jetdeploy_core::spec::execution::{reasons, ExecutionLog, ExecutionRecord, Summary};
use jetdeploy_core::spec::plan::{Plan, PlanStep};
use jetdeploy_core::traits::{ApprovalEntry, CommandOutcome, CommandRunner, ExecutionJournal};
use jetdeploy_core::types::{StepStatus, VerifyStatus};
use tracing::{debug, info, warn};

use super::approval::should_run;
use crate::config::ExecutionOptions;

/// Run `plan` step by step under `policy`.
///
/// Steps run strictly in order, one at a time, with no retries. Command
/// failures are recorded, never returned. A change-log write failure stops
/// the run: no further step is started, the remaining steps are recorded as
/// skipped and the error is carried on the summary. The returned log always
/// holds one record per plan step.
pub fn execute(
    plan: &Plan,
    policy: &ApprovalPolicy,
    runner: &dyn CommandRunner,
    journal: &dyn ExecutionJournal,
    options: &ExecutionOptions,
) -> ExecutionLog {
    let started_at = Utc::now();
    let clock = Instant::now();
    let unconfirmed = plan.requires_human_confirmation && !policy.confirm_low_confidence;
    info!(
        steps = plan.steps.len(),
        status = %plan.overall_status,
        "starting guided execution"
    );
    if unconfirmed {
        warn!("plan needs human confirmation of a low-confidence extraction; no step will run");
    }

    let mut records = Vec::with_capacity(plan.steps.len());
    let mut journal_error: Option<JournalError> = None;
    for step in &plan.steps {
        if journal_error.is_some() {
            records.push(skipped(step, reasons::JOURNAL_WRITE_FAILED));
            continue;
        }

        let decision = if unconfirmed {
            ApprovalDecision::Skip {
                reason: reasons::UNCONFIRMED_LOW_CONFIDENCE.into(),
            }
        } else {
            should_run(step, policy)
        };
        debug!(step = %step.id, risk = %step.risk_level, %decision, "approval decision");

        let approval = ApprovalEntry {
            step_id: step.id.clone(),
            risk_level: step.risk_level.as_str().into(),
            approved: decision.is_approved(),
            reason: decision.reason().into(),
            ts: Utc::now(),
        };
        if let Err(error) = journal.log_approval(&approval) {
            warn!(step = %step.id, %error, "change log rejected the approval; stopping");
            records.push(skipped(step, reasons::JOURNAL_WRITE_FAILED));
            journal_error = Some(error);
            continue;
        }

        let record = if !decision.is_approved() {
            skipped(step, decision.reason())
        } else if options.run_budget.is_some_and(|budget| clock.elapsed() >= budget) {
            warn!(step = %step.id, "run budget exhausted; step not started");
            let mut record = skipped(step, decision.reason());
            record.status = StepStatus::Failed;
            record.failure_reason = Some(reasons::TIMEOUT.into());
            record
        } else {
            run_step(step, decision.reason(), runner)
        };

        if let Err(error) = journal.log_execution(&record) {
            warn!(step = %step.id, %error, "change log rejected the execution record; stopping");
            journal_error = Some(error);
        }
        records.push(record);
    }

    let mut summary = Summary::tally(
        &records,
        plan.overall_status,
        plan.requires_human_confirmation,
        started_at,
        Utc::now(),
    );
    match journal_error {
        Some(error) => summary = summary.with_journal_error(error),
        None => {
            if let Err(error) = journal.log_summary(&summary) {
                warn!(%error, "change log rejected the summary");
                summary = summary.with_journal_error(error);
            }
        }
    }
    info!(
        executed = summary.executed_steps,
        skipped = summary.skipped_steps,
        failed = summary.failed_steps,
        verified = summary.verified_steps,
        "execution finished"
    );
    ExecutionLog { summary, records }
}

fn skipped(step: &PlanStep, reason: &str) -> ExecutionRecord {
    let now = Utc::now();
    ExecutionRecord {
        step_id: step.id.clone(),
        status: StepStatus::Skipped,
        risk_level: step.risk_level,
        decision_reason: reason.into(),
        failure_reason: None,
        started_at: now,
        finished_at: now,
        return_code: None,
        stdout: String::new(),
        stderr: String::new(),
        verify_command: step.verify_command.clone(),
        verify_status: None,
        verify_return_code: None,
        verify_stdout: None,
        verify_stderr: None,
    }
}

fn run_step(step: &PlanStep, reason: &str, runner: &dyn CommandRunner) -> ExecutionRecord {
    let mut record = skipped(step, reason);
    record.started_at = Utc::now();
    info!(step = %step.id, summary = %step.summary, "running step");

    let outcome = match runner.run(&step.command) {
        Ok(outcome) => outcome,
        Err(error) => {
            warn!(step = %step.id, %error, "step could not be started");
            record.status = StepStatus::Failed;
            record.failure_reason = Some(reasons::SPAWN_ERROR.into());
            record.stderr = error.to_string();
            record.finished_at = Utc::now();
            return record;
        }
    };

    record.return_code = Some(outcome.return_code);
    let failure = primary_failure(&outcome);
    record.stdout = outcome.stdout;
    record.stderr = outcome.stderr;

    if let Some(failure) = failure {
        warn!(step = %step.id, code = outcome.return_code, failure, "step failed");
        record.status = StepStatus::Failed;
        record.failure_reason = Some(failure.into());
        record.finished_at = Utc::now();
        return record;
    }

    record.status = StepStatus::Success;
    if let Some(verify) = &step.verify_command {
        verify_step(&mut record, verify, runner);
    }
    record.finished_at = Utc::now();
    record
}

fn primary_failure(outcome: &CommandOutcome) -> Option<&'static str> {
    if outcome.timed_out {
        Some(reasons::TIMEOUT)
    } else if outcome.return_code != 0 {
        Some(reasons::NONZERO_EXIT)
    } else {
        None
    }
}

/// A failed verification turns a successful step into a failed one.
fn verify_step(record: &mut ExecutionRecord, verify: &str, runner: &dyn CommandRunner) {
    let verified = match runner.run(verify) {
        Ok(outcome) => {
            let ok = outcome.succeeded();
            record.verify_return_code = Some(outcome.return_code);
            record.verify_stdout = Some(outcome.stdout);
            record.verify_stderr = Some(outcome.stderr);
            ok
        }
        Err(error) => {
            record.verify_stderr = Some(error.to_string());
            false
        }
    };

    if verified {
        record.verify_status = Some(VerifyStatus::Verified);
    } else {
        warn!(step = %record.step_id, "verification failed");
        record.verify_status = Some(VerifyStatus::VerifyFailed);
        record.status = StepStatus::Failed;
        record.failure_reason = Some(reasons::VERIFY_FAILED.into());
    }
}
