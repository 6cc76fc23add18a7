//! Adapter traits consumed by the synchronization core
//!
//! The core never touches a browser profile or a WebDAV server directly; it
//! drives these two capabilities, which keeps the reconciliation pipeline
//! testable with in-memory doubles and fault injection.

use crate::{RecordSet, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Capability: the local profile's exception record store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the full set of exception records
    async fn read_all(&self) -> Result<RecordSet>;

    /// Replace the full set of exception records
    async fn write_all(&self, records: &RecordSet) -> Result<()>;

    /// Delete every exception record
    async fn clear_all(&self) -> Result<()>;
}

/// Capability: an opaque remote blob store (one WebDAV directory)
///
/// Paths are relative to the store's base URL. Connection-level failures
/// must surface as [`crate::ErrorKind::Connectivity`] so the orchestrator can
/// distinguish "unreachable" from "reachable but unhappy".
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List the entry names directly under a directory
    async fn list(&self, path: &str) -> Result<Vec<String>>;

    /// Fetch a file's content, `None` if it does not exist
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Create or replace a file
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Delete a file
    async fn delete(&self, path: &str) -> Result<()>;

    /// Create a directory if it does not already exist
    async fn ensure_directory(&self, path: &str) -> Result<()>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn read_all(&self) -> Result<RecordSet> {
        (**self).read_all().await
    }

    async fn write_all(&self, records: &RecordSet) -> Result<()> {
        (**self).write_all(records).await
    }

    async fn clear_all(&self) -> Result<()> {
        (**self).clear_all().await
    }
}

#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    async fn list(&self, path: &str) -> Result<Vec<String>> {
        (**self).list(path).await
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(path).await
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        (**self).put(path, bytes).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        (**self).delete(path).await
    }

    async fn ensure_directory(&self, path: &str) -> Result<()> {
        (**self).ensure_directory(path).await
    }
}
