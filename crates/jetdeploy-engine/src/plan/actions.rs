//! Remediation actions synthesized from analysis alternatives.

use jetdeploy_core::spec::analysis::{Alternative, AlternativeKind, Issue};
use jetdeploy_core::types::{RiskLevel, StepKind};

/// Dependency order between actions: system packages, then environments,
/// then application installs. Explanations go last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    SystemPackage,
    Environment,
    Application,
    Explanation,
}

/// A step before ids are assigned and before the sudo policy is applied.
#[derive(Debug, Clone)]
pub struct Action {
    pub scope: Scope,
    pub kind: StepKind,
    pub summary: String,
    pub command: String,
    pub requires_sudo: bool,
    pub risk_level: RiskLevel,
    pub rollback_hint: String,
    pub verify_command: Option<String>,
    pub issue_ref: Option<String>,
}

/// Single-quote a string for POSIX shells.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

pub fn explain(summary: impl Into<String>, text: &str, issue_ref: Option<&str>) -> Action {
    Action {
        scope: Scope::Explanation,
        kind: StepKind::Explanatory,
        summary: summary.into(),
        command: format!("echo {}", shell_quote(text)),
        requires_sudo: false,
        risk_level: RiskLevel::Low,
        rollback_hint: "No state changed by this step.".into(),
        verify_command: None,
        issue_ref: issue_ref.map(String::from),
    }
}

pub fn preflight() -> Action {
    Action {
        scope: Scope::SystemPackage,
        kind: StepKind::Diagnostic,
        summary: "Preflight: review free disk space and memory".into(),
        command: "df -h / && free -m".into(),
        requires_sudo: false,
        risk_level: RiskLevel::Low,
        rollback_hint: "No rollback needed; read-only diagnostic.".into(),
        verify_command: None,
        issue_ref: None,
    }
}

/// pip distribution and import name for a framework.
fn python_package(component: &str) -> (&str, &str) {
    match component {
        "pytorch" => ("torch", "torch"),
        "onnxruntime" => ("onnxruntime-gpu", "onnxruntime"),
        other => (other, other),
    }
}

fn ensure_venv() -> &'static str {
    "[ -d .venv ] || python3 -m venv .venv"
}

/// Actions implementing one alternative, in scope order.
pub fn for_alternative(alt: &Alternative, issue: Option<&Issue>) -> Vec<Action> {
    let issue_ref = Some(alt.issue_ref.clone());
    let target = alt.target_version.as_deref();
    let manager = alt.manager.as_deref();

    match (alt.kind, alt.component.as_str(), manager, target) {
        (AlternativeKind::VersionPin, "python", Some("apt"), Some(v)) => {
            let interp = format!("python{v}");
            vec![
                Action {
                    scope: Scope::SystemPackage,
                    kind: StepKind::Remediation,
                    summary: format!("Install the system {interp} interpreter"),
                    command: format!("sudo apt-get install -y {interp} {interp}-venv"),
                    requires_sudo: true,
                    risk_level: RiskLevel::Medium,
                    rollback_hint: format!("sudo apt-get remove -y {interp} {interp}-venv"),
                    verify_command: Some(format!("{interp} --version")),
                    issue_ref: issue_ref.clone(),
                },
                Action {
                    scope: Scope::Environment,
                    kind: StepKind::Remediation,
                    summary: format!("Create a project virtual environment on {interp}"),
                    command: format!("{interp} -m venv .venv"),
                    requires_sudo: false,
                    risk_level: RiskLevel::Low,
                    rollback_hint: "rm -rf .venv".into(),
                    verify_command: Some(format!(
                        ".venv/bin/python --version 2>&1 | grep -q 'Python {v}'"
                    )),
                    issue_ref,
                },
            ]
        }
        (AlternativeKind::EnvironmentIsolation, "python", Some("conda"), Some(v)) => vec![Action {
            scope: Scope::Environment,
            kind: StepKind::Remediation,
            summary: format!("Create an isolated conda environment with python {v}"),
            command: format!("conda create -y -p ./.conda-env python={v}"),
            requires_sudo: false,
            risk_level: RiskLevel::Medium,
            rollback_hint: "conda env remove -y -p ./.conda-env".into(),
            verify_command: Some(format!(
                "./.conda-env/bin/python --version 2>&1 | grep -q 'Python {v}'"
            )),
            issue_ref,
        }],
        (AlternativeKind::VersionPin, "cuda", Some("apt"), Some(v)) => {
            let package = format!("cuda-toolkit-{}", v.replace('.', "-"));
            vec![Action {
                scope: Scope::SystemPackage,
                kind: StepKind::Remediation,
                summary: format!("Install the JetPack-aligned CUDA {v} toolkit"),
                command: format!("sudo apt-get install -y {package}"),
                requires_sudo: true,
                risk_level: RiskLevel::High,
                rollback_hint: format!("sudo apt-get remove -y {package}"),
                verify_command: Some(format!(
                    "/usr/local/cuda-{v}/bin/nvcc --version | grep -q 'release {v}'"
                )),
                issue_ref,
            }]
        }
        (AlternativeKind::VersionPin, component, Some("pip"), Some(v)) => {
            let (dist, module) = python_package(component);
            vec![Action {
                scope: Scope::Application,
                kind: StepKind::Remediation,
                summary: format!("Pin {component} to {v} in the project virtual environment"),
                command: format!(
                    "{} && .venv/bin/python -m pip install '{dist}=={v}.*'",
                    ensure_venv()
                ),
                requires_sudo: false,
                risk_level: RiskLevel::Medium,
                rollback_hint: format!(".venv/bin/python -m pip uninstall -y {dist}"),
                verify_command: Some(format!(
                    ".venv/bin/python -c \"import sys, {module}; v = {module}.__version__.split('+')[0]; sys.exit(0 if v == '{v}' or v.startswith('{v}.') else 1)\""
                )),
                issue_ref,
            }]
        }
        (AlternativeKind::VersionPin, component, Some("apt"), Some(v)) => vec![Action {
            scope: Scope::SystemPackage,
            kind: StepKind::Remediation,
            summary: format!("Install {component} {v} from the JetPack apt repository"),
            command: format!("sudo apt-get install -y '{component}={v}*'"),
            requires_sudo: true,
            risk_level: RiskLevel::High,
            rollback_hint: format!("sudo apt-get remove -y {component}"),
            verify_command: Some(format!(
                "dpkg -s {component} | grep -qE '^Version: ([0-9]+:)?{v}([.+~-]|$)'"
            )),
            issue_ref,
        }],
        (AlternativeKind::PackageSubstitution, missing, Some(m), _) => {
            let mut action = explain(
                format!("Use {m} in place of unavailable {missing}"),
                &alt.description,
                Some(&alt.issue_ref),
            );
            action.verify_command = Some(format!("command -v {m}"));
            vec![action]
        }
        _ => {
            let text = match issue {
                Some(i) if !i.message.is_empty() => {
                    format!("Manual action for {}: {} ({})", alt.issue_ref, alt.description, i.message)
                }
                _ => format!("Manual action for {}: {}", alt.issue_ref, alt.description),
            };
            vec![explain(
                format!("Manual follow-up for {}", alt.issue_ref),
                &text,
                Some(&alt.issue_ref),
            )]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alt(kind: AlternativeKind, component: &str, manager: &str, target: &str, sudo: bool) -> Alternative {
        Alternative {
            issue_ref: format!("{component}==x"),
            kind,
            component: component.into(),
            target_version: Some(target.into()),
            manager: Some(manager.into()),
            requires_sudo: sudo,
            description: "d".into(),
        }
    }

    #[test]
    fn quoting_survives_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn framework_pin_is_unprivileged_venv_install() {
        let actions = for_alternative(&alt(AlternativeKind::VersionPin, "pytorch", "pip", "2.1", false), None);
        assert_eq!(actions.len(), 1);
        let a = &actions[0];
        assert_eq!(a.scope, Scope::Application);
        assert!(!a.requires_sudo);
        assert_eq!(a.risk_level, RiskLevel::Medium);
        assert!(a.command.contains("'torch==2.1.*'"));
        assert!(!a.rollback_hint.is_empty());
        let verify = a.verify_command.as_deref().unwrap();
        assert!(verify.contains("torch.__version__"));
        // 2.10 must not pass for a 2.1 pin
        assert!(verify.contains("v == '2.1' or v.startswith('2.1.')"));
        assert!(!verify.contains("startswith('2.1')"));
    }

    #[test]
    fn system_python_then_venv() {
        let actions = for_alternative(&alt(AlternativeKind::VersionPin, "python", "apt", "3.10", true), None);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].scope, Scope::SystemPackage);
        assert!(actions[0].requires_sudo);
        assert!(actions[0].risk_level.at_least_medium());
        assert_eq!(actions[1].scope, Scope::Environment);
        assert!(!actions[1].requires_sudo);
    }

    #[test]
    fn cuda_pin_is_high_risk() {
        let actions = for_alternative(&alt(AlternativeKind::VersionPin, "cuda", "apt", "12.6", true), None);
        assert_eq!(actions[0].command, "sudo apt-get install -y cuda-toolkit-12-6");
        assert_eq!(actions[0].risk_level, RiskLevel::High);
    }

    #[test]
    fn manual_alternative_is_explanatory() {
        let mut a = alt(AlternativeKind::Manual, "opencv", "", "", false);
        a.manager = None;
        a.target_version = None;
        let actions = for_alternative(&a, None);
        assert_eq!(actions[0].kind, StepKind::Explanatory);
        assert!(actions[0].command.starts_with("echo '"));
        assert!(!actions[0].kind.is_mutating());
    }
}
