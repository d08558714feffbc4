use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use jetdeploy_core::errors::JournalError;
use jetdeploy_core::spec::execution::{ExecutionRecord, Summary};
use jetdeploy_core::traits::{ApprovalEntry, ExecutionJournal};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const GENESIS: &str = "genesis";

fn line_hash(line: &str) -> String {
    format!("sha256:{:x}", Sha256::digest(line.as_bytes()))
}

fn last_hash(content: &str) -> String {
    content
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(line_hash)
        .unwrap_or_else(|| GENESIS.to_string())
}

/// Append an entry to a JSONL change log, maintaining the hash chain.
///
/// Each line gets `prev_hash`: the SHA-256 of the previous line, or
/// `genesis` for the first. Returns the new line's hash.
pub fn append_entry(path: &Path, event: &str, entry: &Value) -> Result<String, JournalError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(JournalError::WriteFailure(format!(
                "cannot read {}: {e}",
                path.display()
            )))
        }
    };

    let mut line = serde_json::Map::new();
    line.insert("event".into(), Value::String(event.to_string()));
    if let Some(obj) = entry.as_object() {
        for (k, v) in obj {
            line.insert(k.clone(), v.clone());
        }
    }
    line.insert("prev_hash".into(), Value::String(last_hash(&content)));

    let line_json = serde_json::to_string(&Value::Object(line))
        .map_err(|e| JournalError::WriteFailure(e.to_string()))?;
    let hash = line_hash(&line_json);

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| JournalError::WriteFailure(format!("cannot open {}: {e}", path.display())))?;
    writeln!(file, "{line_json}")
        .and_then(|()| file.sync_data())
        .map_err(|e| JournalError::WriteFailure(format!("cannot append {}: {e}", path.display())))?;

    Ok(hash)
}

/// Outcome of walking a change log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub entries: u64,
    pub approvals: u64,
    pub executions: u64,
    pub has_summary: bool,
}

/// Verify the hash chain and the approval-before-execution order.
///
/// Fails with `ChainCorruption(n)` at the first bad entry (0-based).
pub fn verify_chain(path: &Path) -> Result<ChainReport, JournalError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| JournalError::WriteFailure(format!("cannot read {}: {e}", path.display())))?;

    let mut report = ChainReport {
        entries: 0,
        approvals: 0,
        executions: 0,
        has_summary: false,
    };
    let mut prev_hash = GENESIS.to_string();
    let mut approved_steps: BTreeSet<String> = BTreeSet::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let index = report.entries;
        let entry: Value =
            serde_json::from_str(line).map_err(|_| JournalError::ChainCorruption(index))?;

        let entry_prev = entry.get("prev_hash").and_then(Value::as_str);
        if entry_prev != Some(prev_hash.as_str()) {
            return Err(JournalError::ChainCorruption(index));
        }

        let step_id = entry.get("step_id").and_then(Value::as_str);
        match (entry.get("event").and_then(Value::as_str), step_id) {
            (Some("approval"), Some(id)) => {
                approved_steps.insert(id.to_string());
                report.approvals += 1;
            }
            (Some("execution"), Some(id)) => {
                // the decision for a step is always logged first
                if !approved_steps.contains(id) {
                    return Err(JournalError::ChainCorruption(index));
                }
                report.executions += 1;
            }
            (Some("summary"), _) => report.has_summary = true,
            _ => return Err(JournalError::ChainCorruption(index)),
        }

        prev_hash = line_hash(line);
        report.entries += 1;
    }

    Ok(report)
}

/// Per-run sibling of a configured journal path:
/// `logs/deploy.journal.jsonl` becomes `logs/deploy-20261018T120000.000Z.journal.jsonl`.
pub fn run_scoped_path(base: &Path, at: DateTime<Utc>) -> PathBuf {
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name
        .strip_suffix(".journal.jsonl")
        .or_else(|| name.strip_suffix(".jsonl"))
        .unwrap_or(&name);
    let stem = if stem.is_empty() { "run" } else { stem };
    base.with_file_name(format!("{stem}-{}.journal.jsonl", at.format("%Y%m%dT%H%M%S%.3fZ")))
}

/// Hash-chained JSONL journal on disk.
#[derive(Debug, Clone)]
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    /// Start the change log for one run. An existing file is refused, never
    /// appended to.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                JournalError::WriteFailure(format!("cannot create {}: {e}", dir.display()))
            })?;
        }
        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    JournalError::AlreadyExists(path.display().to_string())
                }
                _ => JournalError::WriteFailure(format!("cannot create {}: {e}", path.display())),
            })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append<T: serde::Serialize>(&self, event: &str, value: &T) -> Result<(), JournalError> {
        let entry =
            serde_json::to_value(value).map_err(|e| JournalError::WriteFailure(e.to_string()))?;
        append_entry(&self.path, event, &entry).map(|_| ())
    }
}

impl ExecutionJournal for JsonlJournal {
    fn log_approval(&self, entry: &ApprovalEntry) -> Result<(), JournalError> {
        self.append("approval", entry)
    }

    fn log_execution(&self, record: &ExecutionRecord) -> Result<(), JournalError> {
        self.append("execution", record)
    }

    fn log_summary(&self, summary: &Summary) -> Result<(), JournalError> {
        self.append("summary", summary)
    }
}
