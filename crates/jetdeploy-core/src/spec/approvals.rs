use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Operator-supplied approval policy (`approvals.json`). Read-only during a run.
///
/// Defaults: low-risk steps auto-approved, medium and high need an explicit
/// id (or the matching `approve_all_*` flag).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    #[serde(default = "default_true")]
    pub approve_all_low: bool,

    #[serde(default)]
    pub approve_all_medium: bool,

    #[serde(default)]
    pub approve_all_high: bool,

    #[serde(default)]
    pub approved_step_ids: BTreeSet<String>,

    /// Operator acknowledges a low-confidence extraction and allows the run.
    #[serde(default)]
    pub confirm_low_confidence: bool,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            approve_all_low: true,
            approve_all_medium: false,
            approve_all_high: false,
            approved_step_ids: BTreeSet::new(),
            confirm_low_confidence: false,
        }
    }
}

impl ApprovalPolicy {
    pub fn is_listed(&self, step_id: &str) -> bool {
        self.approved_step_ids.contains(step_id)
    }
}
