//! Core type system for cookiesync
//!
//! This crate provides the fundamental data types shared across the cookiesync
//! workspace: cookie exception records and record sets, the error type used by
//! every stage of a sync run, the merge-strategy and backup-interval value
//! types referenced by the configuration, and the adapter traits that the
//! synchronization core consumes.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{BackupInterval, MergeStrategy};
pub use error::{Error, ErrorKind, Result};
pub use traits::{RecordStore, RemoteStore};
pub use types::{
    ExceptionKind, ExceptionRecord, ExpiryPolicy, PermissionValue, RecordKey, RecordSet, RunId,
    StateFile,
};
