use std::fmt;

/// Outcome of the per-step approval gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve { reason: String },
    Skip { reason: String },
}

impl ApprovalDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalDecision::Approve { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            ApprovalDecision::Approve { reason } | ApprovalDecision::Skip { reason } => reason,
        }
    }
}

impl fmt::Display for ApprovalDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalDecision::Approve { reason } => write!(f, "Approve: {reason}"),
            ApprovalDecision::Skip { reason } => write!(f, "Skip: {reason}"),
        }
    }
}

/// Structural input errors. Fatal: the stage refuses to produce output.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: invalid JSON: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{artifact} failed schema validation:\n{}", violations.join("\n"))]
    Schema {
        artifact: String,
        violations: Vec<String>,
    },
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
    #[error("duplicate step id '{0}' in plan")]
    DuplicateStepId(String),
    #[error("embedded schema error: {0}")]
    EmbeddedSchema(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("analysis is internally inconsistent: {0}")]
    InconsistentAnalysis(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("cannot spawn command: {0}")]
    Spawn(String),
}

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("write failure: {0}")]
    WriteFailure(String),
    #[error("change log {0} already exists; every run writes a new one")]
    AlreadyExists(String),
    #[error("chain corruption at entry {0}")]
    ChainCorruption(u64),
}

/// Structured check result for `jdeploy check --json`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckReport {
    pub file: String,
    pub kind: String,
    pub pass: bool,
    pub errors: Vec<CheckIssue>,
    pub warnings: Vec<CheckIssue>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckIssue {
    pub code: String,
    pub check: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}
