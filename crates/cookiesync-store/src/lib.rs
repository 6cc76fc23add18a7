//! Store adapters for cookiesync
//!
//! Two production adapters back the synchronization core:
//!
//! - [`FirefoxRecordStore`] reads and writes cookie exceptions in a Firefox
//!   profile's `permissions.sqlite`, with profile discovery via
//!   `profiles.ini`
//! - [`WebDavClient`] stores the shared state file on a WebDAV server
//!
//! The in-memory stores in [`memory`] implement the same traits with fault
//! injection hooks and back the integration tests.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod firefox;
pub mod memory;
pub mod webdav;

pub use firefox::{discover_profile, FirefoxRecordStore};
pub use memory::{MemoryRecordStore, MemoryRemoteStore};
pub use webdav::WebDavClient;
