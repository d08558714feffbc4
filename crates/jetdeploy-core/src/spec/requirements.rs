use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::types::{Operator, UnitFloat};

/// Extraction confidence below this needs a human to confirm before acting.
pub const CONFIDENCE_THRESHOLD: f64 = 0.50;

/// A single `component op version` constraint lifted from tutorial text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionConstraint {
    pub component: String,
    pub operator: Operator,
    pub version: String,

    /// Source sentence the constraint was extracted from.
    #[serde(default)]
    pub evidence: String,
}

impl VersionConstraint {
    pub fn component(&self) -> Component {
        Component::normalize(&self.component)
    }

    /// Stable reference used in issues and blocked items, e.g. `cuda>=12.1`.
    pub fn reference(&self) -> String {
        format!("{}{}{}", self.component().key(), self.operator, self.version)
    }
}

/// Requirements extracted from a tutorial (`requirements.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub source_url: String,
    pub hardware_requirements: Vec<String>,
    pub software_requirements: Vec<String>,
    pub version_constraints: Vec<VersionConstraint>,

    #[serde(default)]
    pub notes: Vec<String>,

    /// Defaults to 0.0 when absent, so a silent extractor always needs confirmation.
    #[serde(default)]
    pub confidence: UnitFloat,
}

impl Requirement {
    pub fn requires_human_confirmation(&self) -> bool {
        self.confidence.value() < CONFIDENCE_THRESHOLD
    }
}
