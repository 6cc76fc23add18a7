//! Three-way reconciliation core for cookiesync
//!
//! This crate implements the synchronization pipeline that keeps a local set
//! of cookie-permission exceptions consistent with a single remote store:
//!
//! - **Reconciliation**: a pure three-way diff over the local, remote and
//!   last-synchronized (base) record sets, classifying every key as added,
//!   deleted, modified or conflicting per side
//! - **Conflict Resolution**: the configured merge strategy applied to
//!   conflicting entries and one-sided deletions
//! - **Snapshot Persistence**: the base anchor, atomically replaced only
//!   after a fully successful apply
//! - **Backup Scheduling**: interval-gated local snapshots taken before any
//!   mutation
//! - **Orchestration**: the state machine sequencing read, reconcile,
//!   resolve, apply (or simulate) and persist
//!
//! # Examples
//!
//! ```rust,ignore
//! use cookiesync_sync::{SyncEngine, SyncSettings};
//!
//! let engine = SyncEngine::new(local_store, remote_store, snapshot, backup, settings);
//! let report = engine.run().await?;
//! println!("{} records after sync", report.records);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod backup;
pub mod conflict;
pub mod diff;
pub mod engine;
pub mod snapshot;

pub use backup::BackupScheduler;
pub use conflict::{resolved_record, ConflictResolver, ResolvedAction};
pub use diff::{empty_state_reason, reconcile, ChangeClass, DiffEntry, DiffSummary};
pub use engine::{SyncEngine, SyncReport, SyncSettings, SyncState, REMOTE_STATE_FILE};
pub use snapshot::SnapshotStore;
