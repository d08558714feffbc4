//! Compatibility Analyzer: facts + requirements + matrix -> verdict.
//!
//! Pure: no I/O, inputs are borrowed and never mutated.

pub mod hardware;
pub mod managers;
pub mod rules;
pub mod select;

use jetdeploy_core::component::Component;
use jetdeploy_core::spec::analysis::{Alternative, AlternativeKind, AnalysisResult, Issue, IssueCategory};
use jetdeploy_core::spec::facts::DeviceFacts;
use jetdeploy_core::spec::matrix::CompatibilityMatrix;
use jetdeploy_core::spec::requirements::Requirement;
use jetdeploy_core::types::{Series, Severity};
use tracing::{debug, info, warn};

use self::select::select_alternative;

/// Accumulates findings while requirements are evaluated.
#[derive(Debug, Default)]
pub(crate) struct Findings {
    issues: Vec<Issue>,
    alternatives: Vec<Alternative>,
    blocked: Vec<String>,
    ready: Vec<String>,
}

impl Findings {
    pub(crate) fn ready(&mut self, item: String) {
        if !self.ready.contains(&item) {
            self.ready.push(item);
        }
    }

    /// Record an issue and the tie-break winner among its candidate remediations.
    pub(crate) fn issue(&mut self, issue: Issue, candidates: Vec<Alternative>, tutorial_version: &str) {
        if self.has_issue(&issue.requirement_ref) {
            return;
        }
        if let Some(alt) = select_alternative(candidates, tutorial_version) {
            self.alternatives.push(alt);
        }
        self.issues.push(issue);
    }

    /// Record a `high` issue that blocks deployment. No remediation is proposed.
    pub(crate) fn block(&mut self, mut issue: Issue) {
        if self.has_issue(&issue.requirement_ref) {
            return;
        }
        issue.severity = Severity::High;
        warn!(item = %issue.requirement_ref, category = issue.category.as_str(), "blocked");
        self.blocked.push(issue.requirement_ref.clone());
        self.issues.push(issue);
    }

    fn has_issue(&self, reference: &str) -> bool {
        self.issues.iter().any(|i| i.requirement_ref == reference)
    }
}

pub(crate) fn manual(issue_ref: &str, component: &str, description: String) -> Alternative {
    Alternative {
        issue_ref: issue_ref.to_string(),
        kind: AlternativeKind::Manual,
        component: component.to_string(),
        target_version: None,
        manager: None,
        requires_sudo: false,
        description,
    }
}

/// Compare requirements against the device snapshot and the matrix.
pub fn analyze(
    facts: &DeviceFacts,
    requirement: &Requirement,
    matrix: &CompatibilityMatrix,
) -> AnalysisResult {
    let series = facts.series();
    let mut findings = Findings::default();
    info!(
        series = %series,
        constraints = requirement.version_constraints.len(),
        source = %requirement.source_url,
        "analyzing compatibility"
    );

    check_hardware(facts, requirement, matrix, &mut findings);

    for constraint in &requirement.version_constraints {
        let component = constraint.component();
        let reference = constraint.reference();
        debug!(%reference, "evaluating constraint");

        if let Component::Unmapped(name) = &component {
            rules::unmapped(name, constraint, &mut findings);
            continue;
        }
        if !series.is_known() {
            undetermined(facts, matrix, constraint, &reference, &mut findings);
            continue;
        }

        let ctx = rules::Ctx {
            facts,
            matrix,
            series,
            constraint,
            reference: &reference,
        };
        match &component {
            Component::Jetpack => rules::jetpack(&ctx, &mut findings),
            Component::L4t => rules::l4t(&ctx, &mut findings),
            Component::Cuda | Component::Python | Component::Ubuntu => {
                rules::ranged(&ctx, &component, &mut findings)
            }
            Component::TensorRt => rules::tensorrt(&ctx, &mut findings),
            Component::Framework(name) => rules::framework(&ctx, name, &mut findings),
            Component::Unmapped(_) => {}
        }
    }

    check_package_managers(facts, requirement, matrix, &mut findings);

    let requires_confirmation = requirement.requires_human_confirmation();
    if requires_confirmation {
        warn!(
            confidence = %requirement.confidence,
            "low-confidence extraction; results need human confirmation"
        );
    }

    let result = AnalysisResult::new(
        series,
        requires_confirmation,
        findings.issues,
        findings.alternatives,
        findings.blocked,
        findings.ready,
    );
    info!(
        status = %result.overall_status,
        issues = result.issues.len(),
        blocked = result.blocked_items.len(),
        "analysis complete"
    );
    result
}

/// The series is never guessed: every mapped constraint becomes a high issue.
fn undetermined(
    facts: &DeviceFacts,
    matrix: &CompatibilityMatrix,
    constraint: &jetdeploy_core::spec::requirements::VersionConstraint,
    reference: &str,
    findings: &mut Findings,
) {
    let known: Vec<&str> = matrix.series.keys().map(String::as_str).collect();
    let description = matrix
        .guidance("undetermined-series")
        .unwrap_or("Re-collect device facts and re-run the analysis.")
        .to_string();
    findings.issue(
        Issue {
            requirement_ref: reference.to_string(),
            detected_value: format!(
                "jetpack {} / l4t {}",
                facts.jetpack.installed_version, facts.l4t.release
            ),
            expected_range: known.join("|"),
            severity: Severity::High,
            category: IssueCategory::UndeterminedSeries,
            message: format!(
                "cannot evaluate {reference}: installed series is {}",
                Series::Unknown
            ),
        },
        vec![manual(reference, constraint.component().key(), description)],
        &constraint.version,
    );
}

fn check_hardware(
    facts: &DeviceFacts,
    requirement: &Requirement,
    matrix: &CompatibilityMatrix,
    findings: &mut Findings,
) {
    let required = hardware::required_models(&requirement.hardware_requirements);
    if required.is_empty() {
        return;
    }
    let reference = format!("hardware:{}", required.join(","));
    match hardware::matching_model(&facts.device.model, &required) {
        Some(model) => findings.ready(format!("hardware:{model}")),
        None => {
            let guidance = matrix.guidance("hardware-mismatch").unwrap_or_default();
            findings.block(Issue {
                requirement_ref: reference,
                detected_value: facts.device.model.clone(),
                expected_range: required.join(", "),
                severity: Severity::High,
                category: IssueCategory::HardwareMismatch,
                message: format!(
                    "tutorial targets {}, device is '{}'. {guidance}",
                    required.join(", "),
                    facts.device.model
                )
                .trim_end()
                .to_string(),
            });
        }
    }
}

/// Unconstrained software lines are only checked for package-manager availability.
fn check_package_managers(
    facts: &DeviceFacts,
    requirement: &Requirement,
    matrix: &CompatibilityMatrix,
    findings: &mut Findings,
) {
    let constrained: Vec<String> = requirement
        .version_constraints
        .iter()
        .map(|c| c.component().key().to_string())
        .collect();

    for line in &requirement.software_requirements {
        if managers::mentions_constrained(line, &constrained) {
            continue;
        }
        for manager in managers::named_managers(line, matrix) {
            let reference = format!("manager:{manager}");
            if facts.has_manager(manager) {
                findings.ready(reference);
                continue;
            }
            let candidates: Vec<Alternative> = facts
                .available_managers()
                .filter(|m| matrix.package_managers.contains_key(*m))
                .map(|m| Alternative {
                    issue_ref: reference.clone(),
                    kind: AlternativeKind::PackageSubstitution,
                    component: manager.to_string(),
                    target_version: None,
                    manager: Some(m.to_string()),
                    requires_sudo: matrix.manager_requires_sudo(m),
                    description: format!("install '{line}' with {m} instead of {manager}"),
                })
                .collect();
            let candidates = if candidates.is_empty() {
                vec![manual(
                    &reference,
                    manager,
                    format!("no package manager is available on the device; install {manager} manually"),
                )]
            } else {
                candidates
            };
            findings.issue(
                Issue {
                    requirement_ref: reference.clone(),
                    detected_value: "unavailable".into(),
                    expected_range: "available".into(),
                    severity: Severity::Low,
                    category: IssueCategory::PackageManagerMissing,
                    message: format!("'{line}' needs {manager}, which is not available"),
                },
                candidates,
                "",
            );
        }
    }
}
