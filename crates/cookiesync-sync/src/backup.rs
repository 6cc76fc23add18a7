//! Interval-gated local backups of the exception set
//!
//! Before a run mutates anything it offers the current local records to the
//! scheduler, which writes a timestamped JSON snapshot when the configured
//! interval has elapsed since the previous one. A `last_backup` marker file
//! in the backup directory carries the time of the last snapshot across
//! runs. Backup failures never abort a sync.

use chrono::{DateTime, Utc};
use cookiesync_types::{BackupInterval, Error, RecordSet, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const MARKER_FILE: &str = "last_backup";

/// Writes timestamped record-set snapshots at most once per interval
#[derive(Debug, Clone)]
pub struct BackupScheduler {
    dir: PathBuf,
    enabled: bool,
    interval: BackupInterval,
}

impl BackupScheduler {
    /// Create a scheduler writing into the given directory
    pub fn new<P: Into<PathBuf>>(dir: P, enabled: bool, interval: BackupInterval) -> Self {
        Self {
            dir: dir.into(),
            enabled,
            interval,
        }
    }

    /// Directory holding backup snapshots and the marker file
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a backup if one is due, returning the path written
    ///
    /// Returns `Ok(None)` when backups are disabled or the interval has not
    /// elapsed yet.
    pub async fn maybe_backup(&self, records: &RecordSet) -> Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }

        let now = Utc::now();
        if let Some(last) = self.last_backup_at().await {
            let elapsed = (now - last)
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            if elapsed < self.interval.as_duration() {
                debug!(
                    "Skipping backup, last one {} is within the {} interval",
                    last, self.interval
                );
                return Ok(None);
            }
        }

        let path = self.backup(records, now).await?;
        Ok(Some(path))
    }

    /// Write a backup unconditionally
    pub async fn backup(&self, records: &RecordSet, now: DateTime<Utc>) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::backup(format!(
                "Failed to create backup directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let name = format!("backup_{}.json", now.format("%Y-%m-%dT%H-%M-%S"));
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| Error::backup(format!("Failed to serialize backup: {e}")))?;
        tokio::fs::write(&path, json.as_bytes())
            .await
            .map_err(|e| Error::backup(format!("Failed to write {}: {}", path.display(), e)))?;

        if let Err(e) = tokio::fs::write(self.dir.join(MARKER_FILE), now.to_rfc3339())
            .await
        {
            warn!("Failed to update backup marker: {}", e);
        }

        info!("Backed up {} records to {}", records.len(), path.display());
        Ok(path)
    }

    /// Time of the last backup per the marker file, if readable
    async fn last_backup_at(&self) -> Option<DateTime<Utc>> {
        let contents = tokio::fs::read_to_string(self.dir.join(MARKER_FILE))
            .await
            .ok()?;
        match DateTime::parse_from_rfc3339(contents.trim()) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(e) => {
                warn!("Unreadable backup marker, taking a fresh backup: {}", e);
                None
            }
        }
    }
}
