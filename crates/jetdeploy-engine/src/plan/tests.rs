use super::*;
use crate::analyze::analyze;
use jetdeploy_core::spec::analysis::{Alternative, AlternativeKind, Issue, IssueCategory};
use jetdeploy_core::spec::facts::DeviceFacts;
use jetdeploy_core::spec::matrix::CompatibilityMatrix;
use jetdeploy_core::spec::requirements::Requirement;
use jetdeploy_core::types::{Series, Severity};
use serde_json::{json, Value};

fn facts(series: &str) -> DeviceFacts {
    let (jetpack, l4t, cuda, python) = match series {
        "5.x" => ("5.1.2", "R35.4.1", "11.4.315", "3.8.10"),
        _ => ("6.0", "R36.3.0", "12.2.140", "3.10.12"),
    };
    serde_json::from_value::<DeviceFacts>(json!({
        "device": { "model": "NVIDIA Jetson Orin Nano Developer Kit" },
        "os": { "pretty_name": "Ubuntu 22.04.4 LTS" },
        "jetpack": { "installed_version": jetpack },
        "l4t": { "release": l4t },
        "cuda": { "version": cuda },
        "python": { "version": python },
        "memory": { "total_mb": 7620 },
        "storage": { "root_free_gb": 40.0 },
        "package_managers": { "apt": { "available": true }, "pip": { "available": true } }
    }))
    .unwrap()
    .normalized()
}

fn analysis_for(series: &str, constraints: Value) -> AnalysisResult {
    let req: Requirement = serde_json::from_value(json!({
        "source_url": "https://example.org/tutorial",
        "hardware_requirements": [],
        "software_requirements": [],
        "version_constraints": constraints,
        "confidence": 0.9
    }))
    .unwrap();
    analyze(&facts(series), &req, &CompatibilityMatrix::embedded().unwrap())
}

fn remediation(plan: &Plan) -> Vec<&PlanStep> {
    plan.steps
        .iter()
        .filter(|s| s.kind == StepKind::Remediation)
        .collect()
}

#[test]
fn blocked_analysis_yields_only_explanations() {
    let analysis = analysis_for("5.x", json!([{ "component": "cuda", "operator": ">=", "version": "12.1" }]));
    assert_eq!(analysis.overall_status, OverallStatus::Blocked);

    let plan = generate(&analysis, true, PlanMode::Guided).unwrap();
    assert_eq!(plan.overall_status, OverallStatus::Blocked);
    assert!(remediation(&plan).is_empty());
    assert!(plan.steps.iter().all(|s| !s.kind.is_mutating()));
    assert!(plan.steps.iter().all(|s| !s.requires_sudo));
    assert!(plan
        .steps
        .iter()
        .any(|s| s.issue_ref.as_deref() == Some("cuda>=12.1") && s.kind == StepKind::Explanatory));
}

#[test]
fn framework_pin_yields_one_medium_unprivileged_step() {
    let analysis = analysis_for("6.x", json!([{ "component": "pytorch", "operator": "==", "version": "1.13" }]));
    let plan = generate(&analysis, true, PlanMode::Guided).unwrap();

    let steps = remediation(&plan);
    assert_eq!(steps.len(), 1);
    let step = steps[0];
    assert_eq!(step.risk_level, RiskLevel::Medium);
    assert!(!step.requires_sudo);
    assert!(!step.rollback_hint.is_empty());
    assert!(step.approval_required);
    assert_eq!(step.issue_ref.as_deref(), Some("pytorch==1.13"));
}

#[test]
fn sudo_disabled_rewrites_privileged_step() {
    let analysis = analysis_for("6.x", json!([{ "component": "cuda", "operator": ">=", "version": "12.4" }]));
    let plan = generate(&analysis, false, PlanMode::Guided).unwrap();

    assert!(!plan.allow_sudo);
    assert!(plan.steps.iter().all(|s| !s.requires_sudo));
    assert_eq!(plan.manual_prerequisites.len(), 1);

    let prereq = &plan.manual_prerequisites[0];
    assert_eq!(prereq.reason, SUDO_DISABLED_REASON);
    assert!(prereq.original_command.starts_with("sudo apt-get install"));

    let step = plan.step(&prereq.step_id).unwrap();
    assert_eq!(step.kind, StepKind::ManualPrerequisite);
    assert_eq!(step.risk_level, RiskLevel::High);
    assert!(step.command.starts_with("echo "));
    assert!(step.note.as_deref().unwrap().contains("sudo apt-get install"));
}

#[test]
fn sudo_allowed_keeps_privilege_and_risk_floor() {
    let analysis = analysis_for("6.x", json!([{ "component": "cuda", "operator": ">=", "version": "12.4" }]));
    let plan = generate(&analysis, true, PlanMode::Guided).unwrap();

    assert!(plan.manual_prerequisites.is_empty());
    assert!(plan.privilege_violations().is_empty());
    let sudo: Vec<_> = plan.steps.iter().filter(|s| s.requires_sudo).collect();
    assert_eq!(sudo.len(), 1);
    assert!(sudo[0].risk_level.at_least_medium());
}

#[test]
fn ready_plan_has_preflight_and_ids_in_order() {
    let analysis = analysis_for("6.x", json!([{ "component": "python", "operator": ">=", "version": "3.8" }]));
    let plan = generate(&analysis, true, PlanMode::Guided).unwrap();

    assert_eq!(plan.steps[0].kind, StepKind::Diagnostic);
    for (i, step) in plan.steps.iter().enumerate() {
        assert_eq!(step.id, format!("step-{:03}", i + 1));
    }
    assert!(plan.validate_ids().is_ok());
    assert!(remediation(&plan).is_empty());
}

#[test]
fn system_packages_precede_application_installs() {
    let analysis = analysis_for(
        "6.x",
        json!([
            { "component": "pytorch", "operator": "==", "version": "1.13" },
            { "component": "cuda", "operator": ">=", "version": "12.4" }
        ]),
    );
    let plan = generate(&analysis, true, PlanMode::Guided).unwrap();
    let commands: Vec<&str> = remediation(&plan).iter().map(|s| s.command.as_str()).collect();

    let apt = commands.iter().position(|c| c.contains("apt-get")).unwrap();
    let pip = commands.iter().position(|c| c.contains("pip install")).unwrap();
    assert!(apt < pip, "{commands:?}");
}

#[test]
fn auto_mode_only_gates_high_risk() {
    let analysis = analysis_for(
        "6.x",
        json!([
            { "component": "cuda", "operator": ">=", "version": "12.4" },
            { "component": "pytorch", "operator": "==", "version": "1.13" }
        ]),
    );
    let plan = generate(&analysis, true, PlanMode::Auto).unwrap();
    for step in &plan.steps {
        assert_eq!(step.approval_required, step.risk_level == RiskLevel::High, "{}", step.id);
    }
}

#[test]
fn low_confidence_is_propagated() {
    let mut analysis = analysis_for("6.x", json!([]));
    analysis.requires_human_confirmation = true;
    let plan = generate(&analysis, true, PlanMode::Guided).unwrap();
    assert!(plan.requires_human_confirmation);
}

#[test]
fn inconsistent_analysis_is_rejected() {
    let issue = Issue {
        requirement_ref: "cuda>=12.1".into(),
        detected_value: "11.4".into(),
        expected_range: "12.2..12.6".into(),
        severity: Severity::High,
        category: IssueCategory::CrossSeries,
        message: "m".into(),
    };
    let mut analysis = AnalysisResult::new(
        Series::FiveX,
        false,
        vec![issue],
        vec![],
        vec!["cuda>=12.1".into()],
        vec![],
    );
    analysis.alternatives.push(Alternative {
        issue_ref: "cuda>=12.1".into(),
        kind: AlternativeKind::VersionPin,
        component: "cuda".into(),
        target_version: Some("12.2".into()),
        manager: Some("apt".into()),
        requires_sudo: true,
        description: "d".into(),
    });

    assert!(matches!(
        generate(&analysis, true, PlanMode::Guided),
        Err(PlanError::InconsistentAnalysis(_))
    ));
}
