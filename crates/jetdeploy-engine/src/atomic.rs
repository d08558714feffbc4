use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Write content atomically: write to temp file, fsync, rename.
///
/// Readers see either the previous artifact or the complete new one.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".into());
    let temp_path = dir.join(format!(".{file_name}.{}.tmp", temp_suffix()));

    let mut file = std::fs::File::create(&temp_path)
        .with_context(|| format!("cannot create temp file for {}", path.display()))?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e).with_context(|| format!("cannot rename temp to {}", path.display()));
    }
    Ok(())
}

/// Pretty-printed JSON with a trailing newline, written atomically.
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    atomic_write(path, json.as_bytes())
}

fn temp_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{}-{nanos:x}", std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("execution-log.json");

        atomic_write(&path, b"version 1").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "version 1");

        atomic_write(&path, b"version 2").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "version 2");

        // no temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_json_is_parseable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        write_json(&path, &serde_json::json!({"steps": []})).unwrap();
        let back: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back["steps"], serde_json::json!([]));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("out.json");
        assert!(atomic_write(&path, b"x").is_err());
    }
}
