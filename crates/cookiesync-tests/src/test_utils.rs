//! Fixtures for driving whole sync runs in tests

use chrono::{TimeZone, Utc};
use cookiesync_store::{MemoryRecordStore, MemoryRemoteStore};
use cookiesync_sync::{
    BackupScheduler, SnapshotStore, SyncEngine, SyncReport, SyncSettings, REMOTE_STATE_FILE,
};
use cookiesync_types::{
    ExceptionRecord, PermissionValue, RecordSet, Result, StateFile,
};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Build a never-expiring cookie exception with a second-resolution timestamp
pub fn record(origin: &str, permission: PermissionValue, secs: i64) -> ExceptionRecord {
    ExceptionRecord::cookie(origin, permission, Utc.timestamp_opt(secs, 0).unwrap())
}

/// Collect records into a set
pub fn records(items: &[ExceptionRecord]) -> RecordSet {
    items.iter().cloned().collect()
}

/// A sync pipeline over in-memory stores and a temporary state directory
///
/// The fixture keeps handles to both stores so tests can seed and inspect
/// them across runs; the engine itself is rebuilt per run from the same
/// handles.
pub struct SyncFixture {
    temp: TempDir,
    /// Local record store handle
    pub local: Arc<MemoryRecordStore>,
    /// Remote blob store handle
    pub remote: Arc<MemoryRemoteStore>,
    /// Settings used for the next run
    pub settings: SyncSettings,
}

impl SyncFixture {
    /// Create a fixture with default settings and empty stores
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().expect("temp dir"),
            local: Arc::new(MemoryRecordStore::new()),
            remote: Arc::new(MemoryRemoteStore::new()),
            settings: SyncSettings::default(),
        }
    }

    /// Path of the remote state file for the configured directory
    pub fn remote_file(&self) -> String {
        format!(
            "{}/{}",
            self.settings.remote_dir.trim_end_matches('/'),
            REMOTE_STATE_FILE
        )
    }

    /// Path of the anchor snapshot file
    pub fn state_path(&self) -> PathBuf {
        self.temp.path().join("state.json")
    }

    /// Path of the backup directory
    pub fn backup_dir(&self) -> PathBuf {
        self.temp.path().join("backups")
    }

    /// Seed the local store
    pub async fn seed_local(&self, set: &RecordSet) {
        use cookiesync_types::RecordStore;
        self.local.write_all(set).await.expect("seed local");
    }

    /// Seed the remote state file
    pub fn seed_remote(&self, set: &RecordSet) {
        let bytes = StateFile::now(set.clone()).to_json().expect("serialize");
        self.remote.insert_file(self.remote_file(), bytes);
    }

    /// Seed the anchor snapshot
    pub async fn seed_anchor(&self, set: &RecordSet) {
        SnapshotStore::new(self.state_path())
            .save(&StateFile::now(set.clone()))
            .await
            .expect("seed anchor");
    }

    /// Current anchor contents, if a run has persisted one
    pub async fn anchor(&self) -> Option<RecordSet> {
        SnapshotStore::new(self.state_path())
            .load()
            .await
            .expect("load anchor")
            .map(|state| state.records)
    }

    /// Current remote state file contents, if present
    pub fn remote_records(&self) -> Option<RecordSet> {
        let bytes = self.remote.file(&self.remote_file())?;
        Some(StateFile::from_json(&bytes).expect("parse remote state").records)
    }

    /// Names of backup files written so far
    pub fn backup_files(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.backup_dir()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("backup_"))
            .collect();
        names.sort();
        names
    }

    /// Run one synchronization with the current settings
    pub async fn run(&self) -> Result<SyncReport> {
        self.run_with_backups(false).await
    }

    /// Run one synchronization, optionally with backups enabled
    pub async fn run_with_backups(&self, backups: bool) -> Result<SyncReport> {
        let engine = SyncEngine::new(
            Arc::clone(&self.local),
            Arc::clone(&self.remote),
            SnapshotStore::new(self.state_path()),
            BackupScheduler::new(self.backup_dir(), backups, "1d".parse().expect("interval")),
            self.settings.clone(),
        );
        engine.run().await
    }
}

impl Default for SyncFixture {
    fn default() -> Self {
        Self::new()
    }
}
