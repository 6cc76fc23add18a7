//! Conflict resolution for reconciled diff entries
//!
//! The resolver turns every diff entry into a concrete action according to
//! the configured merge strategy. One-sided changes resolve mechanically;
//! the strategy only decides conflicts and one-sided deletions.

use crate::diff::{ChangeClass, DiffEntry};
use cookiesync_types::{ExceptionRecord, MergeStrategy};
use tracing::debug;

/// Action resolved for one diff entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedAction {
    /// The local version goes into the target set
    KeepLocal,
    /// The remote version goes into the target set
    KeepRemote,
    /// The key is dropped from the target set
    DeleteBoth,
    /// Unresolvable under the configured strategy; the run must abort
    Defer,
}

/// Applies the configured merge strategy to diff entries
#[derive(Debug, Clone, Copy)]
pub struct ConflictResolver {
    strategy: MergeStrategy,
    panic: bool,
}

impl ConflictResolver {
    /// Create a resolver for the given strategy
    ///
    /// With `panic` enabled, `do_nothing` additionally defers one-sided
    /// deletions instead of silently propagating them.
    pub fn new(strategy: MergeStrategy, panic: bool) -> Self {
        Self { strategy, panic }
    }

    /// Resolve one diff entry into an action
    pub fn resolve(&self, entry: &DiffEntry) -> ResolvedAction {
        let action = match entry.class {
            ChangeClass::Unchanged => {
                if entry.local.is_some() {
                    ResolvedAction::KeepLocal
                } else if entry.remote.is_some() {
                    ResolvedAction::KeepRemote
                } else {
                    // Deleted on both sides
                    ResolvedAction::DeleteBoth
                }
            }
            ChangeClass::AddedLocal | ChangeClass::ModifiedLocal => ResolvedAction::KeepLocal,
            ChangeClass::AddedRemote | ChangeClass::ModifiedRemote => ResolvedAction::KeepRemote,
            ChangeClass::DeletedLocal => self.resolve_deletion(true),
            ChangeClass::DeletedRemote => self.resolve_deletion(false),
            ChangeClass::AddedBoth | ChangeClass::ModifiedBoth => self.resolve_conflict(entry),
        };

        if entry.class.is_conflict() || entry.class.is_one_sided_deletion() {
            debug!(
                "Resolved {:?} for '{}' with {:?} ({})",
                entry.class, entry.key, action, self.strategy
            );
        }
        action
    }

    /// Resolve a one-sided deletion
    ///
    /// The non-deleting side is unchanged since the base snapshot, so there
    /// is no competing edit: `use_newest` simply propagates the deletion,
    /// while `use_local`/`use_remote` honor it only when it originated on
    /// the favored side and otherwise resurrect the favored version.
    fn resolve_deletion(&self, deleted_locally: bool) -> ResolvedAction {
        match self.strategy {
            MergeStrategy::UseNewest => ResolvedAction::DeleteBoth,
            MergeStrategy::UseLocal => {
                if deleted_locally {
                    ResolvedAction::DeleteBoth
                } else {
                    ResolvedAction::KeepLocal
                }
            }
            MergeStrategy::UseRemote => {
                if deleted_locally {
                    ResolvedAction::KeepRemote
                } else {
                    ResolvedAction::DeleteBoth
                }
            }
            MergeStrategy::DoNothing => {
                if self.panic {
                    ResolvedAction::Defer
                } else {
                    ResolvedAction::DeleteBoth
                }
            }
        }
    }

    /// Resolve a real conflict (added or modified on both sides)
    ///
    /// A side can be absent here when a deletion collided with an edit; the
    /// favored side being absent then means "delete both".
    fn resolve_conflict(&self, entry: &DiffEntry) -> ResolvedAction {
        match self.strategy {
            MergeStrategy::UseLocal => {
                if entry.local.is_some() {
                    ResolvedAction::KeepLocal
                } else {
                    ResolvedAction::DeleteBoth
                }
            }
            MergeStrategy::UseRemote => {
                if entry.remote.is_some() {
                    ResolvedAction::KeepRemote
                } else {
                    ResolvedAction::DeleteBoth
                }
            }
            MergeStrategy::UseNewest => match (&entry.local, &entry.remote) {
                (Some(l), Some(r)) => {
                    // Ties fall back to local
                    if r.modified > l.modified {
                        ResolvedAction::KeepRemote
                    } else {
                        ResolvedAction::KeepLocal
                    }
                }
                (Some(_), None) => ResolvedAction::KeepLocal,
                (None, Some(_)) => ResolvedAction::KeepRemote,
                (None, None) => ResolvedAction::DeleteBoth,
            },
            MergeStrategy::DoNothing => ResolvedAction::Defer,
        }
    }
}

/// The record an action selects for the target set, if any
pub fn resolved_record(entry: &DiffEntry, action: ResolvedAction) -> Option<&ExceptionRecord> {
    match action {
        ResolvedAction::KeepLocal => entry.local.as_ref(),
        ResolvedAction::KeepRemote => entry.remote.as_ref(),
        ResolvedAction::DeleteBoth | ResolvedAction::Defer => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use cookiesync_types::{ExceptionRecord, PermissionValue, RecordKey};

    fn record(origin: &str, permission: PermissionValue, ts: i64) -> ExceptionRecord {
        ExceptionRecord::cookie(origin, permission, Utc.timestamp_opt(ts, 0).unwrap())
    }

    fn entry(
        class: ChangeClass,
        local: Option<ExceptionRecord>,
        remote: Option<ExceptionRecord>,
        base: Option<ExceptionRecord>,
    ) -> DiffEntry {
        let key = local
            .as_ref()
            .or(remote.as_ref())
            .or(base.as_ref())
            .map(ExceptionRecord::key)
            .unwrap_or_else(|| RecordKey {
                origin: "https://void.example".into(),
                kind: cookiesync_types::ExceptionKind::Cookie,
            });
        DiffEntry {
            key,
            class,
            local,
            remote,
            base,
        }
    }

    fn conflict_entry(local_ts: i64, remote_ts: i64) -> DiffEntry {
        entry(
            ChangeClass::ModifiedBoth,
            Some(record("https://a.example", PermissionValue::Block, local_ts)),
            Some(record(
                "https://a.example",
                PermissionValue::AllowSession,
                remote_ts,
            )),
            Some(record("https://a.example", PermissionValue::Allow, 1_000)),
        )
    }

    #[test]
    fn test_one_sided_changes_resolve_mechanically() {
        let rec = record("https://a.example", PermissionValue::Allow, 2_000);
        for strategy in [
            MergeStrategy::UseLocal,
            MergeStrategy::UseNewest,
            MergeStrategy::UseRemote,
            MergeStrategy::DoNothing,
        ] {
            let resolver = ConflictResolver::new(strategy, true);
            assert_eq!(
                resolver.resolve(&entry(ChangeClass::AddedLocal, Some(rec.clone()), None, None)),
                ResolvedAction::KeepLocal
            );
            assert_eq!(
                resolver.resolve(&entry(ChangeClass::AddedRemote, None, Some(rec.clone()), None)),
                ResolvedAction::KeepRemote
            );
        }
    }

    #[test]
    fn test_use_newest_picks_higher_timestamp() {
        let resolver = ConflictResolver::new(MergeStrategy::UseNewest, true);

        assert_eq!(
            resolver.resolve(&conflict_entry(3_000, 2_000)),
            ResolvedAction::KeepLocal
        );
        assert_eq!(
            resolver.resolve(&conflict_entry(2_000, 3_000)),
            ResolvedAction::KeepRemote
        );
    }

    #[test]
    fn test_use_newest_is_symmetric() {
        // The winning version is the same regardless of which side is
        // "local"; only the action name flips.
        let resolver = ConflictResolver::new(MergeStrategy::UseNewest, true);

        let forward = conflict_entry(2_000, 3_000);
        let mirrored = entry(
            ChangeClass::ModifiedBoth,
            forward.remote.clone(),
            forward.local.clone(),
            forward.base.clone(),
        );

        let winner_forward =
            resolved_record(&forward, resolver.resolve(&forward)).cloned();
        let winner_mirrored =
            resolved_record(&mirrored, resolver.resolve(&mirrored)).cloned();
        assert_eq!(winner_forward, winner_mirrored);
        assert_eq!(winner_forward.unwrap().modified.timestamp(), 3_000);
    }

    #[test]
    fn test_use_newest_tie_falls_back_to_local() {
        let resolver = ConflictResolver::new(MergeStrategy::UseNewest, true);
        assert_eq!(
            resolver.resolve(&conflict_entry(2_000, 2_000)),
            ResolvedAction::KeepLocal
        );
    }

    #[test]
    fn test_use_local_and_use_remote_conflicts() {
        let conflict = conflict_entry(2_000, 3_000);

        let local = ConflictResolver::new(MergeStrategy::UseLocal, true);
        assert_eq!(local.resolve(&conflict), ResolvedAction::KeepLocal);

        let remote = ConflictResolver::new(MergeStrategy::UseRemote, true);
        assert_eq!(remote.resolve(&conflict), ResolvedAction::KeepRemote);
    }

    #[test]
    fn test_deletion_handling_per_strategy() {
        let base = record("https://a.example", PermissionValue::Allow, 1_000);
        let deleted_locally = entry(
            ChangeClass::DeletedLocal,
            None,
            Some(base.clone()),
            Some(base.clone()),
        );
        let deleted_remotely = entry(
            ChangeClass::DeletedRemote,
            Some(base.clone()),
            None,
            Some(base),
        );

        // use_newest propagates the deletion: nothing competes with it
        let newest = ConflictResolver::new(MergeStrategy::UseNewest, true);
        assert_eq!(newest.resolve(&deleted_locally), ResolvedAction::DeleteBoth);
        assert_eq!(newest.resolve(&deleted_remotely), ResolvedAction::DeleteBoth);

        // use_local honors local deletions, overrides remote ones
        let local = ConflictResolver::new(MergeStrategy::UseLocal, true);
        assert_eq!(local.resolve(&deleted_locally), ResolvedAction::DeleteBoth);
        assert_eq!(local.resolve(&deleted_remotely), ResolvedAction::KeepLocal);

        // use_remote mirrors use_local
        let remote = ConflictResolver::new(MergeStrategy::UseRemote, true);
        assert_eq!(remote.resolve(&deleted_locally), ResolvedAction::KeepRemote);
        assert_eq!(remote.resolve(&deleted_remotely), ResolvedAction::DeleteBoth);
    }

    #[test]
    fn test_do_nothing_defers_conflicts() {
        let resolver = ConflictResolver::new(MergeStrategy::DoNothing, false);
        assert_eq!(
            resolver.resolve(&conflict_entry(2_000, 3_000)),
            ResolvedAction::Defer
        );
    }

    #[test]
    fn test_do_nothing_deletions_depend_on_panic() {
        let base = record("https://a.example", PermissionValue::Allow, 1_000);
        let deleted_locally = entry(
            ChangeClass::DeletedLocal,
            None,
            Some(base.clone()),
            Some(base),
        );

        let with_panic = ConflictResolver::new(MergeStrategy::DoNothing, true);
        assert_eq!(with_panic.resolve(&deleted_locally), ResolvedAction::Defer);

        let without_panic = ConflictResolver::new(MergeStrategy::DoNothing, false);
        assert_eq!(
            without_panic.resolve(&deleted_locally),
            ResolvedAction::DeleteBoth
        );
    }

    #[test]
    fn test_delete_versus_edit_under_each_strategy() {
        // Deleted locally, edited remotely: classified modified_both with no
        // local version.
        let edited = record("https://a.example", PermissionValue::Block, 3_000);
        let base = record("https://a.example", PermissionValue::Allow, 1_000);
        let conflict = entry(
            ChangeClass::ModifiedBoth,
            None,
            Some(edited.clone()),
            Some(base),
        );

        // Favoring the deleted side means deleting both
        let local = ConflictResolver::new(MergeStrategy::UseLocal, true);
        assert_eq!(local.resolve(&conflict), ResolvedAction::DeleteBoth);

        // The surviving edit is the only timestamped version
        let newest = ConflictResolver::new(MergeStrategy::UseNewest, true);
        assert_eq!(newest.resolve(&conflict), ResolvedAction::KeepRemote);

        let remote = ConflictResolver::new(MergeStrategy::UseRemote, true);
        assert_eq!(remote.resolve(&conflict), ResolvedAction::KeepRemote);
    }
}
