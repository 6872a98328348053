//! Shared helpers for locating and reading snapshot files.
//!
//! These functions are used by the CLI and by integration tests.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::Snapshot;

/// Gets the cross-platform path of the saved snapshot.
///
/// Returns the path as `{data_dir}/tagmap/snapshot.json` where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined.
pub fn get_snapshot_path() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Failed to determine data directory"))?;

    Ok(data_dir.join("tagmap").join("snapshot.json"))
}

/// Ensures the parent directory of `path` exists.
///
/// # Errors
///
/// Returns an error if directory creation fails.
pub fn ensure_parent_directory(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create snapshot directory: {}", parent.display())
        })?;
    }
    Ok(())
}

/// Reads a snapshot in the `/all/` wire format.
pub fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse snapshot: {}", path.display()))
}

/// Writes `snapshot` as pretty-printed JSON, creating parent directories.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    ensure_parent_directory(path)?;
    let text = serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write snapshot: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TagId, TagRecord};

    #[test]
    fn get_snapshot_path_returns_valid_path() {
        let path = get_snapshot_path().expect("data directory should resolve");
        assert!(path.to_string_lossy().contains("tagmap"));
        assert!(path.to_string_lossy().ends_with("snapshot.json"));
    }

    #[test]
    fn snapshot_survives_disk() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("nested").join("snapshot.json");
        let snapshot = Snapshot {
            tags: vec![TagRecord::new(TagId::new(1), "main")],
            entries: vec![],
        };

        write_snapshot(&path, &snapshot).expect("failed to write snapshot");
        let read = read_snapshot(&path).expect("failed to read snapshot");

        assert_eq!(read.tags.len(), 1);
        assert_eq!(read.tags[0].name, "main");
    }

    #[test]
    fn read_snapshot_reports_the_path() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("missing.json");

        let error = read_snapshot(&path).expect_err("missing file should fail");

        assert!(error.to_string().contains("missing.json"));
    }
}
