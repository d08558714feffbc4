//! The approval gate. Nothing runs without a satisfied `should_run`.

use jetdeploy_core::errors::ApprovalDecision;
use jetdeploy_core::spec::approvals::ApprovalPolicy;
use jetdeploy_core::spec::execution::reasons;
use jetdeploy_core::spec::plan::PlanStep;
use jetdeploy_core::types::RiskLevel;

/// Decide whether `step` may run under `policy`.
///
/// An explicit id always wins. Unrecognized risk is never auto-approved.
pub fn should_run(step: &PlanStep, policy: &ApprovalPolicy) -> ApprovalDecision {
    if policy.is_listed(&step.id) {
        return ApprovalDecision::Approve {
            reason: reasons::APPROVED_BY_ID.into(),
        };
    }

    let (blanket, missing) = match step.risk_level {
        RiskLevel::Low => (policy.approve_all_low, reasons::MISSING_LOW),
        RiskLevel::Medium => (policy.approve_all_medium, reasons::MISSING_MEDIUM),
        RiskLevel::High => (policy.approve_all_high, reasons::MISSING_HIGH),
        RiskLevel::Unrecognized => {
            return ApprovalDecision::Skip {
                reason: reasons::UNRECOGNIZED_RISK.into(),
            }
        }
    };

    if blanket {
        ApprovalDecision::Approve {
            reason: reasons::approve_all(step.risk_level.as_str()),
        }
    } else {
        ApprovalDecision::Skip {
            reason: missing.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, risk: RiskLevel) -> PlanStep {
        serde_json::from_value::<PlanStep>(serde_json::json!({
            "id": id,
            "command": "true",
            "requires_sudo": false,
            "rollback_hint": "none",
        }))
        .map(|mut s| {
            s.risk_level = risk;
            s
        })
        .unwrap()
    }

    #[test]
    fn defaults_approve_low_only() {
        let policy = ApprovalPolicy::default();
        let low = should_run(&step("step-001", RiskLevel::Low), &policy);
        assert!(low.is_approved());
        assert_eq!(low.reason(), "approve-all-low");

        let medium = should_run(&step("step-002", RiskLevel::Medium), &policy);
        assert_eq!(
            medium,
            ApprovalDecision::Skip {
                reason: "missing-medium-approval".into()
            }
        );
        let high = should_run(&step("step-003", RiskLevel::High), &policy);
        assert_eq!(high.reason(), "missing-high-approval");
    }

    #[test]
    fn listed_id_approves_any_risk() {
        let mut policy = ApprovalPolicy::default();
        policy.approved_step_ids.insert("step-004".into());
        for risk in [RiskLevel::High, RiskLevel::Unrecognized] {
            let d = should_run(&step("step-004", risk), &policy);
            assert!(d.is_approved());
            assert_eq!(d.reason(), "approved-by-id");
        }
    }

    #[test]
    fn unrecognized_risk_fails_closed() {
        let policy = ApprovalPolicy {
            approve_all_low: true,
            approve_all_medium: true,
            approve_all_high: true,
            ..ApprovalPolicy::default()
        };
        let d = should_run(&step("step-001", RiskLevel::Unrecognized), &policy);
        assert_eq!(d.reason(), "unrecognized-risk-needs-approval");
        assert!(!d.is_approved());
    }

    #[test]
    fn low_can_be_withheld() {
        let policy = ApprovalPolicy {
            approve_all_low: false,
            ..ApprovalPolicy::default()
        };
        let d = should_run(&step("step-001", RiskLevel::Low), &policy);
        assert_eq!(d.reason(), "missing-low-approval");
    }

    #[test]
    fn blanket_high_flag() {
        let policy = ApprovalPolicy {
            approve_all_high: true,
            ..ApprovalPolicy::default()
        };
        let d = should_run(&step("step-009", RiskLevel::High), &policy);
        assert_eq!(d.reason(), "approve-all-high");
    }
}
