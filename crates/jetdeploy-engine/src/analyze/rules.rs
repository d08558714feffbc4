//! Per-component evaluation of a single version constraint.

use jetdeploy_core::component::Component;
use jetdeploy_core::spec::analysis::{Alternative, AlternativeKind, Issue, IssueCategory};
use jetdeploy_core::spec::facts::DeviceFacts;
use jetdeploy_core::spec::matrix::CompatibilityMatrix;
use jetdeploy_core::spec::requirements::VersionConstraint;
use jetdeploy_core::types::{Operator, Series, Severity};
use jetdeploy_core::version::{self, satisfies};

use super::{manual, Findings};

pub(crate) struct Ctx<'a> {
    pub facts: &'a DeviceFacts,
    pub matrix: &'a CompatibilityMatrix,
    pub series: Series,
    pub constraint: &'a VersionConstraint,
    pub reference: &'a str,
}

impl Ctx<'_> {
    fn issue(
        &self,
        detected: impl Into<String>,
        expected: impl Into<String>,
        severity: Severity,
        category: IssueCategory,
        message: String,
    ) -> Issue {
        Issue {
            requirement_ref: self.reference.to_string(),
            detected_value: detected.into(),
            expected_range: expected.into(),
            severity,
            category,
            message,
        }
    }

    fn guidance(&self, key: &str) -> String {
        self.matrix.guidance(key).unwrap_or_default().to_string()
    }

    fn pin(&self, component: &str, target: &str, manager: &str, description: String) -> Alternative {
        Alternative {
            issue_ref: self.reference.to_string(),
            kind: AlternativeKind::VersionPin,
            component: component.to_string(),
            target_version: Some(target.to_string()),
            manager: Some(manager.to_string()),
            requires_sudo: self.matrix.manager_requires_sudo(manager),
            description,
        }
    }

    fn cross_series(&self, detected: String, other: Series, expected: String) -> Issue {
        self.issue(
            detected,
            expected,
            Severity::High,
            IssueCategory::CrossSeries,
            format!(
                "{} is only satisfiable on {other}; installed series is {}. {}",
                self.reference,
                self.series,
                self.guidance("cross-series")
            )
            .trim_end()
            .to_string(),
        )
    }
}

/// JetPack itself: only the series major is compared.
pub(crate) fn jetpack(ctx: &Ctx<'_>, findings: &mut Findings) {
    let c = ctx.constraint;
    let required = Series::from_major(&c.version);
    if !required.is_known() || required == ctx.series {
        findings.ready(ctx.reference.to_string());
        return;
    }
    let (have, want) = (
        version::major(ctx.series.as_str()).unwrap_or(0),
        version::major(&c.version).unwrap_or(0),
    );
    let mismatch = match c.operator {
        Operator::Eq | Operator::Compatible => true,
        Operator::Ge | Operator::Gt => want > have,
        Operator::Le | Operator::Lt => want < have,
    };
    if mismatch {
        findings.block(ctx.cross_series(
            ctx.facts.jetpack.installed_version.clone(),
            required,
            format!("{}{}", c.operator, c.version),
        ));
    } else {
        findings.ready(ctx.reference.to_string());
    }
}

/// L4T is informational; the series was already derived from it.
pub(crate) fn l4t(ctx: &Ctx<'_>, findings: &mut Findings) {
    findings.ready(format!("{} (installed {})", ctx.reference, ctx.facts.l4t.release));
}

/// CUDA, Python, Ubuntu: `[min, max]` spans per series.
pub(crate) fn ranged(ctx: &Ctx<'_>, component: &Component, findings: &mut Findings) {
    let c = ctx.constraint;
    let key = component.key();

    let Some(installed) = ctx.facts.installed_version(component) else {
        findings.issue(
            ctx.issue(
                "unknown",
                format!("{}{}", c.operator, c.version),
                Severity::Medium,
                IssueCategory::UnknownInstalledVersion,
                format!("installed {key} version is unknown; manual verification required"),
            ),
            vec![manual(
                ctx.reference,
                key,
                format!("collect {key} facts again and re-run the analysis"),
            )],
            &c.version,
        );
        return;
    };

    let Some(range) = ctx.matrix.range(ctx.series, component) else {
        missing_support_map(ctx, key, &installed, findings);
        return;
    };

    if satisfies(&installed, c.operator, &c.version) {
        findings.ready(ctx.reference.to_string());
        return;
    }

    match range.reachable(c.operator, &c.version) {
        None => {
            if let Some(fallback) = ctx.matrix.fallback(component, ctx.series) {
                findings.issue(
                    ctx.issue(
                        installed.clone(),
                        range.to_string(),
                        Severity::Medium,
                        IssueCategory::OutOfRange,
                        format!(
                            "{} is outside the {} range {range}; documented fallback is {fallback}",
                            ctx.reference, ctx.series
                        ),
                    ),
                    ranged_candidates(ctx, component, fallback),
                    &c.version,
                );
                return;
            }
            let elsewhere = ctx.matrix.other_series(ctx.series).find(|(s, _)| {
                ctx.matrix
                    .range(*s, component)
                    .is_some_and(|r| r.reachable(c.operator, &c.version).is_some())
            });
            if let Some((other, _)) = elsewhere {
                findings.block(ctx.cross_series(installed, other, range.to_string()));
                return;
            }
            let nearest = range.nearest_bound(&c.version).to_string();
            findings.issue(
                ctx.issue(
                    installed,
                    range.to_string(),
                    Severity::Medium,
                    IssueCategory::OutOfRange,
                    format!(
                        "no series satisfies {}; nearest tested {} version is {nearest}",
                        ctx.reference, ctx.series
                    ),
                ),
                ranged_candidates(ctx, component, &nearest),
                &c.version,
            );
        }
        Some(target) => {
            findings.issue(
                ctx.issue(
                    installed.clone(),
                    range.to_string(),
                    Severity::Medium,
                    IssueCategory::InSeriesAdjustment,
                    format!(
                        "installed {key} {installed} does not satisfy {}; {target} is within the {} range",
                        ctx.reference, ctx.series
                    ),
                ),
                ranged_candidates(ctx, component, &target),
                &c.version,
            );
        }
    }
}

/// Remediation candidates for moving a ranged component to `target`.
fn ranged_candidates(ctx: &Ctx<'_>, component: &Component, target: &str) -> Vec<Alternative> {
    let short = short_version(target);
    match component {
        Component::Python => {
            let mut out = vec![ctx.pin(
                "python",
                &short,
                "apt",
                format!("install the system python{short} interpreter and build a virtual environment on it"),
            )];
            if ctx.facts.has_manager("conda") {
                out.push(Alternative {
                    kind: AlternativeKind::EnvironmentIsolation,
                    ..ctx.pin(
                        "python",
                        &short,
                        "conda",
                        format!("create an isolated conda environment with python={short}"),
                    )
                });
            }
            out
        }
        Component::Cuda => vec![ctx.pin(
            "cuda",
            &short,
            "apt",
            format!(
                "install the JetPack-aligned cuda-toolkit {short} package from the {} repository",
                ctx.series
            ),
        )],
        _ => vec![manual(
            ctx.reference,
            component.key(),
            format!(
                "{} {short} is fixed by the JetPack image; do not force an OS release change",
                component.key()
            ),
        )],
    }
}

/// TensorRT majors are tied to the image.
pub(crate) fn tensorrt(ctx: &Ctx<'_>, findings: &mut Findings) {
    let c = ctx.constraint;
    let installed = ctx
        .facts
        .installed_version(&Component::TensorRt)
        .unwrap_or_else(|| "unknown".into());
    let Some(profile) = ctx.matrix.profile(ctx.series) else {
        missing_support_map(ctx, "tensorrt", &installed, findings);
        return;
    };
    let required_major = version::major(&c.version)
        .map(|m| m.to_string())
        .unwrap_or_else(|| c.version.clone());
    if satisfies(&profile.tensorrt_major, c.operator, &required_major) {
        findings.ready(ctx.reference.to_string());
        return;
    }
    let expected = format!("{}.x", profile.tensorrt_major);
    if let Some(fallback) = ctx.matrix.fallback(&Component::TensorRt, ctx.series) {
        findings.issue(
            ctx.issue(
                installed,
                expected,
                Severity::Medium,
                IssueCategory::RuntimeMajorMismatch,
                format!("{} conflicts with the {} TensorRT major; documented fallback is {fallback}", ctx.reference, ctx.series),
            ),
            vec![ctx.pin(
                "tensorrt",
                fallback,
                "apt",
                format!("install the documented TensorRT {fallback} packages"),
            )],
            &c.version,
        );
        return;
    }
    findings.block(ctx.issue(
        installed,
        expected,
        Severity::High,
        IssueCategory::RuntimeMajorMismatch,
        format!(
            "TensorRT major {required_major} is incompatible with {} (ships {}). {}",
            ctx.series,
            profile.tensorrt_major,
            ctx.guidance("runtime-major-mismatch")
        )
        .trim_end()
        .to_string(),
    ));
}

/// Frameworks with tested wheel tracks (pytorch, onnxruntime, ...).
pub(crate) fn framework(ctx: &Ctx<'_>, name: &str, findings: &mut Findings) {
    let c = ctx.constraint;
    let track = ctx.matrix.framework_track(ctx.series, name);

    if track.is_empty() {
        let elsewhere = ctx.matrix.other_series(ctx.series).find(|(s, _)| {
            ctx.matrix
                .framework_track(*s, name)
                .iter()
                .any(|t| version::track_admits(t, c.operator, &c.version))
        });
        if let Some((other, _)) = elsewhere {
            findings.block(ctx.cross_series(
                format!("no {name} track on {}", ctx.series),
                other,
                "none".into(),
            ));
            return;
        }
        missing_support_map(ctx, name, "unknown", findings);
        return;
    }

    if track.iter().any(|t| version::track_admits(t, c.operator, &c.version)) {
        findings.ready(ctx.reference.to_string());
        return;
    }

    let candidates = track
        .iter()
        .map(|t| {
            ctx.pin(
                name,
                t,
                "pip",
                format!("pin {name} to the tested {t} wheel for {} in a virtual environment", ctx.series),
            )
        })
        .collect();
    findings.issue(
        ctx.issue(
            format!("tested: {}", track.join(", ")),
            format!("{}..{}", track[0], track[track.len() - 1]),
            Severity::Medium,
            IssueCategory::FrameworkTrack,
            format!("{name} {} is not on the tested {} track", c.version, ctx.series),
        ),
        candidates,
        &c.version,
    );
}

pub(crate) fn unmapped(name: &str, c: &VersionConstraint, findings: &mut Findings) {
    let reference = c.reference();
    findings.issue(
        Issue {
            requirement_ref: reference.clone(),
            detected_value: "unknown".into(),
            expected_range: format!("{}{}", c.operator, c.version),
            severity: Severity::Low,
            category: IssueCategory::UnmappedComponent,
            message: format!("'{name}' has no compatibility mapping; manual review required"),
        },
        vec![manual(
            &reference,
            name,
            format!("map '{name}' to Jetson-compatible packages by hand"),
        )],
        &c.version,
    );
}

fn missing_support_map(ctx: &Ctx<'_>, key: &str, installed: &str, findings: &mut Findings) {
    findings.issue(
        ctx.issue(
            installed,
            "unmapped",
            Severity::Medium,
            IssueCategory::MissingSupportMap,
            format!("the matrix has no {key} data for {}", ctx.series),
        ),
        vec![manual(
            ctx.reference,
            key,
            format!("validate {key} availability for {} by hand", ctx.series),
        )],
        &ctx.constraint.version,
    );
}

/// `major.minor` of a version ("12.6.1" -> "12.6", "3" -> "3").
fn short_version(v: &str) -> String {
    v.split('.').take(2).collect::<Vec<_>>().join(".")
}
