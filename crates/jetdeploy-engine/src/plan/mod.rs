//! Plan Generator: analysis -> ordered, risk-classified steps.

pub mod actions;

use jetdeploy_core::errors::PlanError;
use jetdeploy_core::spec::analysis::AnalysisResult;
use jetdeploy_core::spec::plan::{ManualPrerequisite, Plan, PlanStep};
use jetdeploy_core::types::{OverallStatus, PlanMode, RiskLevel, StepKind};
use tracing::{debug, info, warn};

use self::actions::{explain, for_alternative, preflight, shell_quote, Action};

pub const SUDO_DISABLED_REASON: &str = "allow-sudo=no";

/// Build a plan. Fails fast on an analysis that contradicts itself.
pub fn generate(
    analysis: &AnalysisResult,
    allow_sudo: bool,
    mode: PlanMode,
) -> Result<Plan, PlanError> {
    analysis.check_consistency()?;
    info!(
        status = %analysis.overall_status,
        allow_sudo,
        mode = ?mode,
        "generating plan"
    );

    let mut actions = vec![preflight()];
    match analysis.overall_status {
        OverallStatus::Blocked => actions.extend(blocked_actions(analysis)),
        OverallStatus::Ready => actions.push(explain(
            "Compatibility check passed",
            "Compatibility check passed. Continue with the project-specific install commands.",
            None,
        )),
        OverallStatus::NeedsAdjustments => {
            let mut remediation = remediation_actions(analysis);
            // stable: keeps issue order within a scope
            remediation.sort_by_key(|a| a.scope);
            actions.extend(remediation);
        }
    }

    let mut steps = Vec::with_capacity(actions.len());
    let mut manual_prerequisites = Vec::new();
    for (i, action) in actions.into_iter().enumerate() {
        let id = format!("step-{:03}", i + 1);
        let mut step = to_step(id, action, mode);
        if step.requires_sudo && !allow_sudo {
            manual_prerequisites.push(ManualPrerequisite {
                step_id: step.id.clone(),
                original_command: step.command.clone(),
                reason: SUDO_DISABLED_REASON.into(),
            });
            step = as_manual_prerequisite(step);
        }
        debug!(id = %step.id, risk = %step.risk_level, sudo = step.requires_sudo, "planned step");
        steps.push(step);
    }

    if !manual_prerequisites.is_empty() {
        warn!(
            count = manual_prerequisites.len(),
            "privileged steps rewritten as manual prerequisites"
        );
    }

    Ok(Plan {
        mode,
        overall_status: analysis.overall_status,
        allow_sudo,
        requires_human_confirmation: analysis.requires_human_confirmation,
        steps,
        manual_prerequisites,
    })
}

/// Explanations only: no remediation command for a blocked deployment.
fn blocked_actions(analysis: &AnalysisResult) -> Vec<Action> {
    let mut out: Vec<Action> = analysis
        .issues
        .iter()
        .filter(|i| analysis.blocked_items.contains(&i.requirement_ref))
        .map(|i| {
            explain(
                format!("Blocked: {}", i.requirement_ref),
                &format!(
                    "Deployment blocked by {} (detected {}, expected {}). {}",
                    i.requirement_ref, i.detected_value, i.expected_range, i.message
                ),
                Some(&i.requirement_ref),
            )
        })
        .collect();
    let deferred = analysis.issues.len() - out.len();
    if deferred > 0 {
        out.push(explain(
            "Deferred adjustments",
            &format!("{deferred} further adjustment(s) are deferred until the blockers are resolved."),
            None,
        ));
    }
    out
}

fn remediation_actions(analysis: &AnalysisResult) -> Vec<Action> {
    let mut out = Vec::new();
    for issue in &analysis.issues {
        match analysis.alternative_for(&issue.requirement_ref) {
            Some(alt) => out.extend(for_alternative(alt, Some(issue))),
            None => out.push(explain(
                format!("Review {}", issue.requirement_ref),
                &format!(
                    "No automated remediation for {}: {}",
                    issue.requirement_ref, issue.message
                ),
                Some(&issue.requirement_ref),
            )),
        }
    }
    out
}

fn to_step(id: String, action: Action, mode: PlanMode) -> PlanStep {
    // privileged steps are never below medium
    let risk_level = if action.requires_sudo && !action.risk_level.at_least_medium() {
        RiskLevel::Medium
    } else {
        action.risk_level
    };
    let approval_required = match mode {
        PlanMode::Guided => risk_level != RiskLevel::Low,
        PlanMode::Auto => risk_level == RiskLevel::High,
    };
    PlanStep {
        id,
        kind: action.kind,
        summary: action.summary,
        command: action.command,
        requires_sudo: action.requires_sudo,
        risk_level,
        rollback_hint: action.rollback_hint,
        verify_command: action.verify_command,
        issue_ref: action.issue_ref,
        approval_required,
        note: None,
    }
}

/// Keep the risk, drop the privilege, tell the human what to run.
fn as_manual_prerequisite(step: PlanStep) -> PlanStep {
    let note = format!(
        "sudo is disabled for this plan; run `{}` out-of-band before continuing",
        step.command
    );
    PlanStep {
        kind: StepKind::ManualPrerequisite,
        command: format!(
            "echo {}",
            shell_quote(&format!(
                "Manual prerequisite (run out-of-band with sudo): {}",
                step.command
            ))
        ),
        requires_sudo: false,
        note: Some(note),
        ..step
    }
}

#[cfg(test)]
mod tests;
