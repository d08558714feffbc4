//! Stage-boundary data contracts. Every artifact is a standalone JSON document.

pub mod analysis;
pub mod approvals;
pub mod execution;
pub mod facts;
pub mod matrix;
pub mod plan;
pub mod requirements;

pub use analysis::{Alternative, AlternativeKind, AnalysisResult, Issue, IssueCategory};
pub use approvals::ApprovalPolicy;
pub use execution::{ExecutionLog, ExecutionRecord, NotExecuted, Summary};
pub use facts::DeviceFacts;
pub use matrix::CompatibilityMatrix;
pub use plan::{ManualPrerequisite, Plan, PlanStep};
pub use requirements::{Requirement, VersionConstraint};
