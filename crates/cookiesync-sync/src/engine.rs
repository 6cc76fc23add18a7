//! Orchestration of one synchronization run
//!
//! The engine sequences a run through a fixed set of states: load both
//! sides and the base anchor, reconcile, resolve, apply to both stores and
//! persist the new anchor. A simulate run walks the same pipeline but stops
//! short of every write, including backups.
//!
//! Apply order matters for failure handling: the local store is written
//! first, then the remote file. When the remote write fails after the local
//! one succeeded the run reports a partial apply and leaves the old anchor
//! in place, so the next run re-reconciles from the pre-apply base and
//! converges again.

use crate::backup::BackupScheduler;
use crate::conflict::{resolved_record, ConflictResolver, ResolvedAction};
use crate::diff::{empty_state_reason, reconcile, DiffSummary};
use crate::snapshot::SnapshotStore;
use cookiesync_types::{
    Error, MergeStrategy, RecordSet, RecordStore, RemoteStore, Result, RunId, StateFile,
};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Name of the record state file inside the remote directory
pub const REMOTE_STATE_FILE: &str = "records.json";

/// Phase a sync run has reached
///
/// States advance strictly forward; an error freezes the run in the state
/// it had reached, which the report of a failed run would show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncState {
    /// Run created, nothing read yet
    Init,
    /// Local, remote and base record sets are in memory
    Loaded,
    /// The three-way diff has been computed
    Reconciled,
    /// Every diff entry has a resolved action
    Resolved,
    /// Both stores hold the target set
    Applied,
    /// The base anchor points at the target set
    Persisted,
    /// Run finished
    Done,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Loaded => "loaded",
            Self::Reconciled => "reconciled",
            Self::Resolved => "resolved",
            Self::Applied => "applied",
            Self::Persisted => "persisted",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Settings controlling one run
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Abort when an empty side would overwrite a previously non-empty state
    pub panic: bool,
    /// Strategy applied to conflicts and one-sided deletions
    pub merge_strategy: MergeStrategy,
    /// Walk the pipeline without writing anything
    pub simulate: bool,
    /// Remote directory holding the state file
    pub remote_dir: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            panic: true,
            merge_strategy: MergeStrategy::default(),
            simulate: false,
            remote_dir: "/cookie-exceptions".to_string(),
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Identifier of this run
    pub run_id: RunId,
    /// Final state reached
    pub state: SyncState,
    /// Whether this was a simulate run
    pub simulated: bool,
    /// Per-class counts from the reconciliation
    pub summary: DiffSummary,
    /// Records in the target set
    pub records: usize,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

/// Drives one synchronization run over a local and a remote store
pub struct SyncEngine<S, R> {
    local: S,
    remote: R,
    snapshot: SnapshotStore,
    backup: BackupScheduler,
    settings: SyncSettings,
}

impl<S: RecordStore, R: RemoteStore> SyncEngine<S, R> {
    /// Create an engine over the given stores
    pub fn new(
        local: S,
        remote: R,
        snapshot: SnapshotStore,
        backup: BackupScheduler,
        settings: SyncSettings,
    ) -> Self {
        Self {
            local,
            remote,
            snapshot,
            backup,
            settings,
        }
    }

    fn remote_file(&self) -> String {
        format!(
            "{}/{}",
            self.settings.remote_dir.trim_end_matches('/'),
            REMOTE_STATE_FILE
        )
    }

    /// Execute one run
    pub async fn run(&self) -> Result<SyncReport> {
        let run_id = RunId::new_v4();
        let started = Instant::now();
        let mut state = SyncState::Init;
        info!(%run_id, %state, simulate = self.settings.simulate, "Starting sync run");

        // Load both sides and the anchor
        if !self.settings.simulate {
            self.remote.ensure_directory(&self.settings.remote_dir).await?;
        }
        let local = self.local.read_all().await?;
        let remote_bytes = self.remote.get(&self.remote_file()).await?;
        let remote_missing = remote_bytes.is_none();
        let remote = match &remote_bytes {
            Some(bytes) => StateFile::from_json(bytes)?.records,
            None => RecordSet::new(),
        };
        let base = self
            .snapshot
            .load()
            .await?
            .map(|s| s.records)
            .unwrap_or_default();
        state = SyncState::Loaded;
        info!(
            %run_id,
            %state,
            local = local.len(),
            remote = remote.len(),
            base = base.len(),
            remote_missing,
            "Loaded record sets"
        );

        if self.settings.panic {
            if let Some(reason) = empty_state_reason(&local, &remote, &base, remote_missing) {
                return Err(Error::suspicious_empty_state(reason));
            }
        }

        if !self.settings.simulate {
            // Backup before anything is mutated; failures never abort
            if let Err(e) = self.backup.maybe_backup(&local).await {
                warn!(%run_id, "Backup failed: {}", e);
            }
        }

        // Reconcile
        let entries = reconcile(&local, &remote, &base);
        let summary = DiffSummary::from_entries(&entries);
        state = SyncState::Reconciled;
        info!(%run_id, %state, %summary, "Reconciled");

        // Resolve
        let resolver = ConflictResolver::new(self.settings.merge_strategy, self.settings.panic);
        let mut target = RecordSet::new();
        let mut deferred = Vec::new();
        for entry in &entries {
            let action = resolver.resolve(entry);
            if action == ResolvedAction::Defer {
                deferred.push(entry.key.to_string());
            } else if let Some(record) = resolved_record(entry, action) {
                target.insert(record.clone());
            }
        }
        if !deferred.is_empty() {
            return Err(Error::unresolved_conflict(deferred));
        }
        state = SyncState::Resolved;
        debug!(%run_id, %state, records = target.len(), "Resolved target set");

        let local_dirty = target != local;
        let remote_dirty = remote_missing || target != remote;

        if self.settings.simulate {
            info!(
                %run_id,
                records = target.len(),
                local_dirty,
                remote_dirty,
                "Simulate run, nothing written"
            );
            state = SyncState::Done;
            return Ok(SyncReport {
                run_id,
                state,
                simulated: true,
                summary,
                records: target.len(),
                duration: started.elapsed(),
            });
        }

        // Apply, local first
        let state_file = StateFile::now(target.clone());
        let mut local_written = false;
        if local_dirty {
            self.local.write_all(&target).await?;
            local_written = true;
            debug!(%run_id, records = target.len(), "Wrote local store");
        }
        if remote_dirty {
            let bytes = state_file.to_json()?;
            if let Err(e) = self.remote.put(&self.remote_file(), &bytes).await {
                if local_written {
                    return Err(Error::partial_apply(format!(
                        "Local store updated but the remote write failed, \
                         anchor left at the previous state: {e}"
                    )));
                }
                return Err(e);
            }
            debug!(%run_id, "Wrote remote state file");
        }
        state = SyncState::Applied;
        debug!(%run_id, %state, "Applied target set");

        // Persist the new anchor only after both stores hold the target
        self.snapshot.save(&state_file).await?;
        state = SyncState::Persisted;
        debug!(%run_id, %state, "Anchor replaced");

        state = SyncState::Done;
        let duration = started.elapsed();
        info!(
            %run_id,
            records = target.len(),
            ?duration,
            "Sync run finished"
        );
        Ok(SyncReport {
            run_id,
            state,
            simulated: false,
            summary,
            records: target.len(),
            duration,
        })
    }
}
