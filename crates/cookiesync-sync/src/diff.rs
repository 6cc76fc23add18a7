//! Three-way difference detection over record sets
//!
//! Classification is a pure function of the three input sets: the current
//! local set, the current remote set, and the base snapshot both sides were
//! last known to agree on. The base anchor is what lets a local deletion be
//! told apart from a remote addition, which a two-way diff cannot do.

use cookiesync_types::{ExceptionRecord, RecordKey, RecordSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Classification of one key across the three record sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeClass {
    /// Same content everywhere, or both sides converged on the same change
    /// (including deletion on both sides)
    Unchanged,
    /// Added locally since the base snapshot
    AddedLocal,
    /// Added remotely since the base snapshot
    AddedRemote,
    /// Added on both sides with different content (conflict)
    AddedBoth,
    /// Deleted locally, unchanged remotely
    DeletedLocal,
    /// Deleted remotely, unchanged locally
    DeletedRemote,
    /// Modified locally, unchanged remotely
    ModifiedLocal,
    /// Modified remotely, unchanged locally
    ModifiedRemote,
    /// Changed differently on both sides, where deletion on one side with a
    /// modification on the other counts as a change on both (conflict)
    ModifiedBoth,
}

impl ChangeClass {
    /// Whether this classification is a conflict needing the merge strategy
    pub fn is_conflict(self) -> bool {
        matches!(self, Self::AddedBoth | Self::ModifiedBoth)
    }

    /// Whether this classification is a one-sided deletion
    pub fn is_one_sided_deletion(self) -> bool {
        matches!(self, Self::DeletedLocal | Self::DeletedRemote)
    }
}

/// One key's classification with the record versions that produced it
#[derive(Debug, Clone)]
pub struct DiffEntry {
    /// Key this entry describes
    pub key: RecordKey,
    /// Classification across the three sets
    pub class: ChangeClass,
    /// Current local version, if present
    pub local: Option<ExceptionRecord>,
    /// Current remote version, if present
    pub remote: Option<ExceptionRecord>,
    /// Base snapshot version, if present
    pub base: Option<ExceptionRecord>,
}

/// Compute the three-way diff between local, remote and base record sets
///
/// Produces one entry per key in the union of the three sets, in
/// deterministic key order. Pure: depends only on record content and never
/// mutates its inputs.
pub fn reconcile(local: &RecordSet, remote: &RecordSet, base: &RecordSet) -> Vec<DiffEntry> {
    let keys: BTreeSet<&RecordKey> = local
        .keys()
        .chain(remote.keys())
        .chain(base.keys())
        .collect();

    let entries: Vec<DiffEntry> = keys
        .into_iter()
        .map(|key| {
            let b = base.get(key);
            let l = local.get(key);
            let r = remote.get(key);
            let class = classify(b, l, r);
            debug!("{key}: {class:?}");
            DiffEntry {
                key: key.clone(),
                class,
                local: l.cloned(),
                remote: r.cloned(),
                base: b.cloned(),
            }
        })
        .collect();

    entries
}

/// Classify one key given its three optional versions
fn classify(
    base: Option<&ExceptionRecord>,
    local: Option<&ExceptionRecord>,
    remote: Option<&ExceptionRecord>,
) -> ChangeClass {
    match base {
        None => match (local, remote) {
            (Some(_), None) => ChangeClass::AddedLocal,
            (None, Some(_)) => ChangeClass::AddedRemote,
            (Some(l), Some(r)) if l.same_content(r) => ChangeClass::Unchanged,
            (Some(_), Some(_)) => ChangeClass::AddedBoth,
            // Key came from the union of the three sets
            (None, None) => unreachable!("key absent from all three sets"),
        },
        Some(b) => match (local, remote) {
            (Some(l), Some(r)) => match (l.same_content(b), r.same_content(b)) {
                (true, true) => ChangeClass::Unchanged,
                (false, true) => ChangeClass::ModifiedLocal,
                (true, false) => ChangeClass::ModifiedRemote,
                (false, false) if l.same_content(r) => ChangeClass::Unchanged,
                (false, false) => ChangeClass::ModifiedBoth,
            },
            // Deleted on one side; an edit on the surviving side makes it a
            // delete-versus-edit conflict rather than a plain deletion
            (None, Some(r)) if r.same_content(b) => ChangeClass::DeletedLocal,
            (None, Some(_)) => ChangeClass::ModifiedBoth,
            (Some(l), None) if l.same_content(b) => ChangeClass::DeletedRemote,
            (Some(_), None) => ChangeClass::ModifiedBoth,
            (None, None) => ChangeClass::Unchanged,
        },
    }
}

/// Reason the current states look suspiciously empty, if any
///
/// A sync that previously saw records but now sees an empty local set, an
/// empty remote set, or no remote state file at all has most likely hit a
/// lost profile or a failed fetch. Propagating that emptiness would delete
/// every exception on the other side, so with panic enabled the run aborts
/// instead. Pure; the orchestrator turns a `Some` into the abort.
pub fn empty_state_reason(
    local: &RecordSet,
    remote: &RecordSet,
    base: &RecordSet,
    remote_state_missing: bool,
) -> Option<String> {
    if base.is_empty() {
        return None;
    }
    if remote_state_missing {
        return Some(format!(
            "remote state file is missing but the last sync saw {} record(s)",
            base.len()
        ));
    }
    if local.is_empty() {
        return Some(format!(
            "local store is empty but the last sync saw {} record(s)",
            base.len()
        ));
    }
    if remote.is_empty() {
        return Some(format!(
            "remote store is empty but the last sync saw {} record(s)",
            base.len()
        ));
    }
    None
}

/// Per-class entry counts for one reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Keys with no effective change
    pub unchanged: usize,
    /// Keys added locally
    pub added_local: usize,
    /// Keys added remotely
    pub added_remote: usize,
    /// Keys deleted locally
    pub deleted_local: usize,
    /// Keys deleted remotely
    pub deleted_remote: usize,
    /// Keys modified locally
    pub modified_local: usize,
    /// Keys modified remotely
    pub modified_remote: usize,
    /// Conflicting keys (added or modified on both sides)
    pub conflicts: usize,
}

impl DiffSummary {
    /// Tally the entries of one reconciliation
    pub fn from_entries(entries: &[DiffEntry]) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            match entry.class {
                ChangeClass::Unchanged => summary.unchanged += 1,
                ChangeClass::AddedLocal => summary.added_local += 1,
                ChangeClass::AddedRemote => summary.added_remote += 1,
                ChangeClass::DeletedLocal => summary.deleted_local += 1,
                ChangeClass::DeletedRemote => summary.deleted_remote += 1,
                ChangeClass::ModifiedLocal => summary.modified_local += 1,
                ChangeClass::ModifiedRemote => summary.modified_remote += 1,
                ChangeClass::AddedBoth | ChangeClass::ModifiedBoth => summary.conflicts += 1,
            }
        }
        summary
    }

    /// Whether anything other than `unchanged` was classified
    pub fn has_changes(&self) -> bool {
        self.added_local
            + self.added_remote
            + self.deleted_local
            + self.deleted_remote
            + self.modified_local
            + self.modified_remote
            + self.conflicts
            > 0
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "+{}l +{}r -{}l -{}r ~{}l ~{}r !{} ={}",
            self.added_local,
            self.added_remote,
            self.deleted_local,
            self.deleted_remote,
            self.modified_local,
            self.modified_remote,
            self.conflicts,
            self.unchanged
        )
    }
}
