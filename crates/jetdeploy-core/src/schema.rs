use std::fmt;
use std::path::Path;
use std::str::FromStr;

use jsonschema::Validator;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::{CheckIssue, CheckReport, InputError};
use crate::spec::analysis::AnalysisResult;
use crate::spec::approvals::ApprovalPolicy;
use crate::spec::facts::DeviceFacts;
use crate::spec::matrix::CompatibilityMatrix;
use crate::spec::plan::Plan;
use crate::spec::requirements::Requirement;
use crate::types::{OverallStatus, RiskLevel, Series};

const SCHEMA_REQUIREMENTS: &str = include_str!("../schema/requirements.schema.json");
const SCHEMA_FACTS: &str = include_str!("../schema/facts.schema.json");
const SCHEMA_ANALYSIS: &str = include_str!("../schema/analysis.schema.json");
const SCHEMA_PLAN: &str = include_str!("../schema/plan.schema.json");
const SCHEMA_APPROVALS: &str = include_str!("../schema/approvals.schema.json");
const SCHEMA_MATRIX: &str = include_str!("../schema/matrix.schema.json");

/// The JSON documents exchanged between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Requirements,
    Facts,
    Analysis,
    Plan,
    Approvals,
    Matrix,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 6] = [
        ArtifactKind::Requirements,
        ArtifactKind::Facts,
        ArtifactKind::Analysis,
        ArtifactKind::Plan,
        ArtifactKind::Approvals,
        ArtifactKind::Matrix,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Requirements => "requirements",
            ArtifactKind::Facts => "facts",
            ArtifactKind::Analysis => "analysis",
            ArtifactKind::Plan => "plan",
            ArtifactKind::Approvals => "approvals",
            ArtifactKind::Matrix => "matrix",
        }
    }

    fn schema_text(self) -> &'static str {
        match self {
            ArtifactKind::Requirements => SCHEMA_REQUIREMENTS,
            ArtifactKind::Facts => SCHEMA_FACTS,
            ArtifactKind::Analysis => SCHEMA_ANALYSIS,
            ArtifactKind::Plan => SCHEMA_PLAN,
            ArtifactKind::Approvals => SCHEMA_APPROVALS,
            ArtifactKind::Matrix => SCHEMA_MATRIX,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                format!("unknown artifact kind '{s}' (expected requirements, facts, analysis, plan, approvals, matrix)")
            })
    }
}

/// Compile the embedded schema for an artifact kind.
pub fn validator_for(kind: ArtifactKind) -> Result<Validator, InputError> {
    let schema: Value = serde_json::from_str(kind.schema_text())
        .map_err(|e| InputError::EmbeddedSchema(format!("{kind}: {e}")))?;
    Validator::new(&schema).map_err(|e| InputError::EmbeddedSchema(format!("{kind}: {e}")))
}

fn location(path: String) -> String {
    if path.is_empty() {
        "(root)".into()
    } else {
        path
    }
}

/// Schema-validate a value. Every violation is reported, not just the first.
pub fn validate(kind: ArtifactKind, data: &Value) -> Result<(), InputError> {
    let v = validator_for(kind)?;
    if v.is_valid(data) {
        return Ok(());
    }
    let violations = v
        .iter_errors(data)
        .map(|error| format!("  {}: {error}", location(error.instance_path.to_string())))
        .collect();
    Err(InputError::Schema {
        artifact: kind.to_string(),
        violations,
    })
}

pub fn read_json(path: &Path) -> Result<Value, InputError> {
    let content = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_json(&content, &path.display().to_string())
}

pub fn parse_json(text: &str, context: &str) -> Result<Value, InputError> {
    serde_json::from_str(text).map_err(|source| InputError::Json {
        context: context.to_string(),
        source,
    })
}

/// Validate then deserialize into the typed record.
pub fn from_value<T: DeserializeOwned>(
    kind: ArtifactKind,
    data: Value,
    context: &str,
) -> Result<T, InputError> {
    validate(kind, &data)?;
    serde_json::from_value(data).map_err(|source| InputError::Json {
        context: format!("{context} ({kind})"),
        source,
    })
}

fn load<T: DeserializeOwned>(kind: ArtifactKind, path: &Path) -> Result<T, InputError> {
    let data = read_json(path)?;
    from_value(kind, data, &path.display().to_string())
}

pub fn load_requirements(path: &Path) -> Result<Requirement, InputError> {
    load(ArtifactKind::Requirements, path)
}

/// Facts come back with the series filled in.
pub fn load_facts(path: &Path) -> Result<DeviceFacts, InputError> {
    load::<DeviceFacts>(ArtifactKind::Facts, path).map(DeviceFacts::normalized)
}

pub fn load_analysis(path: &Path) -> Result<AnalysisResult, InputError> {
    load(ArtifactKind::Analysis, path)
}

pub fn load_plan(path: &Path) -> Result<Plan, InputError> {
    let plan: Plan = load(ArtifactKind::Plan, path)?;
    plan.validate_ids()?;
    Ok(plan)
}

/// No file means the documented defaults.
pub fn load_approvals(path: Option<&Path>) -> Result<ApprovalPolicy, InputError> {
    match path {
        Some(p) => load(ArtifactKind::Approvals, p),
        None => Ok(ApprovalPolicy::default()),
    }
}

/// No file means the matrix compiled into the binary.
pub fn load_matrix(path: Option<&Path>) -> Result<CompatibilityMatrix, InputError> {
    match path {
        Some(p) => load(ArtifactKind::Matrix, p),
        None => CompatibilityMatrix::embedded().map_err(|source| InputError::Json {
            context: "embedded matrix".into(),
            source,
        }),
    }
}

fn issue(code: &str, check: &str, message: String, path: Option<String>) -> CheckIssue {
    CheckIssue {
        code: code.to_string(),
        check: check.to_string(),
        message,
        path,
    }
}

/// Full check producing a structured report (for `jdeploy check --json`).
pub fn check(kind: ArtifactKind, data: &Value, file: &str) -> CheckReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match validator_for(kind) {
        Ok(v) => {
            for error in v.iter_errors(data) {
                let path = error.instance_path.to_string();
                errors.push(issue(
                    "E001",
                    "schema",
                    error.to_string(),
                    Some(if path.is_empty() {
                        "$(root)".to_string()
                    } else {
                        format!("${path}")
                    }),
                ));
            }
        }
        Err(e) => errors.push(issue("E000", "schema", e.to_string(), None)),
    }

    // Semantic checks only make sense on a structurally valid document.
    if errors.is_empty() {
        match kind {
            ArtifactKind::Requirements => check_requirements(data, &mut errors, &mut warnings),
            ArtifactKind::Facts => check_facts(data, &mut errors, &mut warnings),
            ArtifactKind::Analysis => check_analysis(data, &mut errors),
            ArtifactKind::Plan => check_plan(data, &mut errors, &mut warnings),
            ArtifactKind::Approvals => check_approvals(data, &mut warnings),
            ArtifactKind::Matrix => check_matrix(data, &mut errors),
        }
    }

    CheckReport {
        file: file.to_string(),
        kind: kind.to_string(),
        pass: errors.is_empty(),
        errors,
        warnings,
    }
}

fn typed<T: DeserializeOwned>(data: &Value, errors: &mut Vec<CheckIssue>) -> Option<T> {
    match serde_json::from_value(data.clone()) {
        Ok(t) => Some(t),
        Err(e) => {
            errors.push(issue("E002", "decode", e.to_string(), None));
            None
        }
    }
}

fn check_requirements(data: &Value, errors: &mut Vec<CheckIssue>, warnings: &mut Vec<CheckIssue>) {
    let Some(req) = typed::<Requirement>(data, errors) else {
        return;
    };
    if req.requires_human_confirmation() {
        warnings.push(issue(
            "W001",
            "confidence",
            format!(
                "extraction confidence {} is below {:.2}; a human must confirm before acting",
                req.confidence,
                crate::spec::requirements::CONFIDENCE_THRESHOLD
            ),
            Some("$.confidence".into()),
        ));
    }
}

fn check_facts(data: &Value, errors: &mut Vec<CheckIssue>, warnings: &mut Vec<CheckIssue>) {
    let Some(facts) = typed::<DeviceFacts>(data, errors) else {
        return;
    };
    if facts.normalized().series() == Series::Unknown {
        warnings.push(issue(
            "W004",
            "series",
            "device series cannot be determined from jetpack or l4t".into(),
            Some("$.jetpack".into()),
        ));
    }
}

fn check_analysis(data: &Value, errors: &mut Vec<CheckIssue>) {
    let Some(analysis) = typed::<AnalysisResult>(data, errors) else {
        return;
    };
    if let Err(e) = analysis.check_consistency() {
        errors.push(issue("E010", "consistency", e.to_string(), None));
    }
}

fn check_plan(data: &Value, errors: &mut Vec<CheckIssue>, warnings: &mut Vec<CheckIssue>) {
    let Some(plan) = typed::<Plan>(data, errors) else {
        return;
    };
    if let Err(e) = plan.validate_ids() {
        errors.push(issue("E011", "step_ids", e.to_string(), None));
    }
    for (i, step) in plan.steps.iter().enumerate() {
        if step.requires_sudo && !step.risk_level.at_least_medium() {
            errors.push(issue(
                "E012",
                "privilege",
                format!(
                    "step '{}' requires sudo but risk_level is '{}'",
                    step.id, step.risk_level
                ),
                Some(format!("$.steps[{i}].risk_level")),
            ));
        }
        if plan.overall_status == OverallStatus::Blocked && step.kind.is_mutating() {
            errors.push(issue(
                "E013",
                "blocked_plan",
                format!("blocked plan carries remediation step '{}'", step.id),
                Some(format!("$.steps[{i}].kind")),
            ));
        }
        if step.risk_level == RiskLevel::Unrecognized {
            warnings.push(issue(
                "W002",
                "risk_level",
                format!(
                    "step '{}' has no recognized risk_level; it only runs when listed by id",
                    step.id
                ),
                Some(format!("$.steps[{i}].risk_level")),
            ));
        }
    }
    if plan.requires_human_confirmation {
        warnings.push(issue(
            "W001",
            "confidence",
            "plan derives from a low-confidence extraction; execution needs confirm_low_confidence".into(),
            Some("$.requires_human_confirmation".into()),
        ));
    }
}

fn check_approvals(data: &Value, warnings: &mut Vec<CheckIssue>) {
    if data.get("approve_all_high").and_then(Value::as_bool) == Some(true) {
        warnings.push(issue(
            "W003",
            "approvals",
            "approve_all_high approves every high-risk step without review".into(),
            Some("$.approve_all_high".into()),
        ));
    }
}

fn check_matrix(data: &Value, errors: &mut Vec<CheckIssue>) {
    let Some(matrix) = typed::<CompatibilityMatrix>(data, errors) else {
        return;
    };
    for (key, profile) in &matrix.series {
        for (name, range) in [
            ("ubuntu", &profile.ubuntu),
            ("cuda", &profile.cuda),
            ("python", &profile.python),
        ] {
            if crate::version::compare_versions(&range.min, &range.max).is_gt() {
                errors.push(issue(
                    "E014",
                    "range",
                    format!("{key}: {name} min {} exceeds max {}", range.min, range.max),
                    Some(format!("$.series.{key}.{name}")),
                ));
            }
        }
    }
}
