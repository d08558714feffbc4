use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::PlanError;
use crate::types::{OverallStatus, Series, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCategory {
    UndeterminedSeries,
    CrossSeries,
    OutOfRange,
    InSeriesAdjustment,
    FrameworkTrack,
    MissingSupportMap,
    RuntimeMajorMismatch,
    HardwareMismatch,
    UnknownInstalledVersion,
    PackageManagerMissing,
    UnmappedComponent,
}

impl IssueCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCategory::UndeterminedSeries => "undetermined-series",
            IssueCategory::CrossSeries => "cross-series",
            IssueCategory::OutOfRange => "out-of-range",
            IssueCategory::InSeriesAdjustment => "in-series-adjustment",
            IssueCategory::FrameworkTrack => "framework-track",
            IssueCategory::MissingSupportMap => "missing-support-map",
            IssueCategory::RuntimeMajorMismatch => "runtime-major-mismatch",
            IssueCategory::HardwareMismatch => "hardware-mismatch",
            IssueCategory::UnknownInstalledVersion => "unknown-installed-version",
            IssueCategory::PackageManagerMissing => "package-manager-missing",
            IssueCategory::UnmappedComponent => "unmapped-component",
        }
    }
}

/// A detected mismatch between a requirement and the installed series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub requirement_ref: String,
    pub detected_value: String,
    pub expected_range: String,
    pub severity: Severity,
    pub category: IssueCategory,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlternativeKind {
    /// Pin a component to a tested in-series version.
    VersionPin,
    /// Use a different package source / manager.
    PackageSubstitution,
    /// Isolate the install in a virtual environment.
    EnvironmentIsolation,
    /// No automatable remediation; a human has to act.
    Manual,
}

/// A proposed remediation for exactly one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub issue_ref: String,
    pub kind: AlternativeKind,
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    pub requires_sudo: bool,
    pub description: String,
}

/// Analyzer output (`analysis.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub overall_status: OverallStatus,
    pub facts_series: Series,
    #[serde(default)]
    pub requires_human_confirmation: bool,
    pub issues: Vec<Issue>,
    pub alternatives: Vec<Alternative>,
    pub blocked_items: Vec<String>,
    pub ready_items: Vec<String>,
}

impl AnalysisResult {
    /// Build a result; `overall_status` is always derived, never passed in.
    pub fn new(
        facts_series: Series,
        requires_human_confirmation: bool,
        issues: Vec<Issue>,
        alternatives: Vec<Alternative>,
        blocked_items: Vec<String>,
        ready_items: Vec<String>,
    ) -> Self {
        let overall_status = derive_status(&issues, &blocked_items);
        Self {
            overall_status,
            facts_series,
            requires_human_confirmation,
            issues,
            alternatives,
            blocked_items,
            ready_items,
        }
    }

    pub fn alternative_for(&self, issue_ref: &str) -> Option<&Alternative> {
        self.alternatives.iter().find(|a| a.issue_ref == issue_ref)
    }

    /// Reject results whose status contradicts their issue list.
    pub fn check_consistency(&self) -> Result<(), PlanError> {
        let refs: BTreeSet<&str> = self.issues.iter().map(|i| i.requirement_ref.as_str()).collect();

        for item in &self.blocked_items {
            let backed = self
                .issues
                .iter()
                .any(|i| i.severity == Severity::High && &i.requirement_ref == item);
            if !backed {
                return Err(PlanError::InconsistentAnalysis(format!(
                    "blocked item '{item}' has no high-severity issue"
                )));
            }
        }

        for alt in &self.alternatives {
            if !refs.contains(alt.issue_ref.as_str()) {
                return Err(PlanError::InconsistentAnalysis(format!(
                    "alternative references unknown issue '{}'",
                    alt.issue_ref
                )));
            }
            if self.blocked_items.contains(&alt.issue_ref) {
                return Err(PlanError::InconsistentAnalysis(format!(
                    "blocked item '{}' carries a remediation alternative",
                    alt.issue_ref
                )));
            }
        }

        let expected = derive_status(&self.issues, &self.blocked_items);
        if self.overall_status != expected {
            return Err(PlanError::InconsistentAnalysis(format!(
                "overall_status is '{}' but issues imply '{}'",
                self.overall_status, expected
            )));
        }
        Ok(())
    }
}

/// `blocked` if a high issue is in `blocked_items`, else `needs-adjustments`
/// if any issue exists, else `ready`.
pub fn derive_status(issues: &[Issue], blocked_items: &[String]) -> OverallStatus {
    let blocked = issues
        .iter()
        .any(|i| i.severity == Severity::High && blocked_items.contains(&i.requirement_ref));
    if blocked {
        OverallStatus::Blocked
    } else if !issues.is_empty() {
        OverallStatus::NeedsAdjustments
    } else {
        OverallStatus::Ready
    }
}
