//! Persistence of the base snapshot (the reconciliation anchor)
//!
//! The snapshot is the record set as it looked after the last fully
//! successful run. It is only ever replaced atomically, by writing a
//! temporary file next to the target and renaming it into place, so a crash
//! mid-write can never leave a truncated anchor behind.

use cookiesync_types::{Error, Result, StateFile};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Loads and atomically replaces the persisted base snapshot
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Create a store backed by the given file path
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot, or `None` when no run has completed yet
    pub async fn load(&self) -> Result<Option<StateFile>> {
        match tokio::fs::read(&self.path).await {
            Ok(contents) => {
                let state = StateFile::from_json(&contents).map_err(|e| {
                    Error::snapshot(format!(
                        "Corrupt snapshot at {}: {}",
                        self.path.display(),
                        e
                    ))
                })?;
                debug!(
                    "Loaded snapshot from {} ({} records, synced {})",
                    self.path.display(),
                    state.records.len(),
                    state.synced_at
                );
                Ok(Some(state))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("No snapshot at {}, treating as first run", self.path.display());
                Ok(None)
            }
            Err(e) => Err(Error::snapshot(format!(
                "Failed to read snapshot at {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Atomically replace the snapshot with the given state
    pub async fn save(&self, state: &StateFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::snapshot(format!(
                    "Failed to create snapshot directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let json = state.to_json()?;
        tokio::fs::write(&tmp, &json).await.map_err(|e| {
            Error::snapshot(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            Error::snapshot(format!(
                "Failed to move snapshot into place at {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(
            "Persisted snapshot to {} ({} records)",
            self.path.display(),
            state.records.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use cookiesync_types::{ExceptionRecord, PermissionValue, RecordSet};
    use tempfile::TempDir;

    fn sample_state() -> StateFile {
        let records: RecordSet = [ExceptionRecord::cookie(
            "https://example.com",
            PermissionValue::Allow,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )]
        .into_iter()
        .collect();
        StateFile::now(records)
    }

    #[tokio::test]
    async fn test_missing_snapshot_loads_as_none() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().join("state.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().join("state.json"));

        let state = sample_state();
        store.save(&state).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.records, state.records);
        assert_eq!(loaded.synced_at, state.synced_at);
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().join("nested/dir/state.json"));

        store.save(&sample_state()).await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file_behind() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().join("state.json"));

        store.save(&sample_state()).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("state.json")]);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SnapshotStore::new(&path);
        let err = store.load().await.unwrap_err();
        assert!(err.to_string().contains("Corrupt snapshot"));
    }
}
