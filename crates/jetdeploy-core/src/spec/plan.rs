use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::InputError;
use crate::types::{OverallStatus, PlanMode, RiskLevel, StepKind};

/// One ordered step of a deployment plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,

    #[serde(default)]
    pub kind: StepKind,

    #[serde(default)]
    pub summary: String,

    pub command: String,

    #[serde(default)]
    pub requires_sudo: bool,

    /// Missing or unknown values deserialize to `Unrecognized` (fail-closed).
    #[serde(default)]
    pub risk_level: RiskLevel,

    pub rollback_hint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_ref: Option<String>,

    #[serde(default)]
    pub approval_required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A privileged command the operator must run out-of-band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualPrerequisite {
    pub step_id: String,
    pub original_command: String,
    pub reason: String,
}

/// Generator output (`deploy-plan.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub mode: PlanMode,
    pub overall_status: OverallStatus,
    #[serde(default)]
    pub allow_sudo: bool,
    #[serde(default)]
    pub requires_human_confirmation: bool,
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub manual_prerequisites: Vec<ManualPrerequisite>,
}

impl Plan {
    /// Step ids must be unique within a plan.
    pub fn validate_ids(&self) -> Result<(), InputError> {
        let mut seen = BTreeSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                return Err(InputError::InvalidValue {
                    field: "steps[].id".into(),
                    message: "step id must not be empty".into(),
                });
            }
            if !seen.insert(step.id.as_str()) {
                return Err(InputError::DuplicateStepId(step.id.clone()));
            }
        }
        Ok(())
    }

    /// Steps that break the sudo/risk invariant (privileged but low or unrecognized risk).
    pub fn privilege_violations(&self) -> Vec<&PlanStep> {
        self.steps
            .iter()
            .filter(|s| s.requires_sudo && !s.risk_level.at_least_medium())
            .collect()
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}
