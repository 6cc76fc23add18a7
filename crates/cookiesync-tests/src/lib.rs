//! Integration test support for cookiesync
//!
//! Shared fixtures that wire a [`cookiesync_sync::SyncEngine`] to the
//! in-memory stores, with the anchor snapshot and backup directory on a
//! temporary filesystem. The integration tests drive whole sync runs
//! through this harness.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod test_utils;
