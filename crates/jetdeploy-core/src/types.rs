#![allow(clippy::doc_markdown)]

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A floating-point value constrained to [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct UnitFloat(f64);

impl UnitFloat {
    pub fn new(v: f64) -> Option<Self> {
        if (0.0..=1.0).contains(&v) {
            Some(Self(v))
        } else {
            None
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for UnitFloat {
    /// Zero: an extraction that reports no confidence is treated as unconfirmed.
    fn default() -> Self {
        Self(0.0)
    }
}

impl fmt::Display for UnitFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Serialize for UnitFloat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UnitFloat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = f64::deserialize(deserializer)?;
        UnitFloat::new(v).ok_or_else(|| serde::de::Error::custom(format!("{v} not in [0.0, 1.0]")))
    }
}

/// Major compatibility generation of the device image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Series {
    #[serde(rename = "5.x")]
    FiveX,
    #[serde(rename = "6.x")]
    SixX,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Series {
    pub fn as_str(self) -> &'static str {
        match self {
            Series::FiveX => "5.x",
            Series::SixX => "6.x",
            Series::Unknown => "unknown",
        }
    }

    /// Map a version string ("5.1.2", "6.x", "6") to its series by leading major.
    pub fn from_major(version: &str) -> Self {
        match version.trim().split('.').next() {
            Some("5") => Series::FiveX,
            Some("6") => Series::SixX,
            _ => Series::Unknown,
        }
    }

    pub fn is_known(self) -> bool {
        self != Series::Unknown
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Series {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "5.x" => Ok(Series::FiveX),
            "6.x" => Ok(Series::SixX),
            "unknown" => Ok(Series::Unknown),
            other => Err(format!("invalid series '{other}' (expected 5.x, 6.x, unknown)")),
        }
    }
}

/// Comparison operator of a version constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "~=")]
    Compatible,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Compatible => "~=",
        }
    }

    /// Operators that ask for "this version or newer".
    pub fn is_lower_bound(self) -> bool {
        matches!(self, Operator::Ge | Operator::Gt | Operator::Compatible)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an analyzer issue. Ordered low < medium < high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Risk classification of a plan step.
///
/// Closed set plus a fail-closed `Unrecognized` arm: anything that is not
/// exactly `low`, `medium` or `high` (including a missing value) lands here
/// and is never auto-approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    #[default]
    Unrecognized,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Unrecognized => "unrecognized",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "low" => RiskLevel::Low,
            "medium" => RiskLevel::Medium,
            "high" => RiskLevel::High,
            _ => RiskLevel::Unrecognized,
        }
    }

    /// True for `medium` and `high`. `Unrecognized` is not a valid privileged level.
    pub fn at_least_medium(&self) -> bool {
        matches!(self, RiskLevel::Medium | RiskLevel::High)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RiskLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Non-string values (null, numbers) also fall through to Unrecognized.
        let v = serde_json::Value::deserialize(deserializer)?;
        Ok(v.as_str().map(RiskLevel::parse).unwrap_or(RiskLevel::Unrecognized))
    }
}

impl From<Severity> for RiskLevel {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Low => RiskLevel::Low,
            Severity::Medium => RiskLevel::Medium,
            Severity::High => RiskLevel::High,
        }
    }
}

/// Verdict of the compatibility analysis. Ordered ready < needs-adjustments < blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverallStatus {
    Ready,
    NeedsAdjustments,
    Blocked,
}

impl OverallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OverallStatus::Ready => "ready",
            OverallStatus::NeedsAdjustments => "needs-adjustments",
            OverallStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    #[default]
    Guided,
    Auto,
}

impl FromStr for PlanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guided" => Ok(PlanMode::Guided),
            "auto" => Ok(PlanMode::Auto),
            other => Err(format!("invalid mode '{other}' (expected guided, auto)")),
        }
    }
}

/// What a plan step is for. Only `Remediation` steps mutate device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    Diagnostic,
    #[default]
    Remediation,
    ManualPrerequisite,
    Explanatory,
}

impl StepKind {
    pub fn is_mutating(self) -> bool {
        self == StepKind::Remediation
    }
}

/// Terminal status of a step in the execution log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Skipped,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerifyStatus {
    Verified,
    VerifyFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}
