//! In-memory store doubles with fault injection
//!
//! Both stores implement the production traits over plain maps guarded by
//! mutexes, plus switches that make individual operations fail. Integration
//! tests use them to drive the pipeline through its failure paths without a
//! profile database or a WebDAV server.

use async_trait::async_trait;
use cookiesync_types::{Error, RecordSet, RecordStore, RemoteStore, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory local record store
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<RecordSet>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with the given records
    pub fn with_records(records: RecordSet) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    /// Current contents of the store
    pub fn records(&self) -> RecordSet {
        self.records.lock().unwrap().clone()
    }

    /// Number of completed `write_all` calls
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make subsequent reads fail
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn read_all(&self) -> Result<RecordSet> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::store("injected read failure"));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    async fn write_all(&self, records: &RecordSet) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::store("injected write failure"));
        }
        *self.records.lock().unwrap() = records.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::store("injected write failure"));
        }
        *self.records.lock().unwrap() = RecordSet::new();
        Ok(())
    }
}

/// In-memory remote blob store
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    offline: AtomicBool,
    fail_puts: AtomicBool,
}

impl MemoryRemoteStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a file directly into the store
    pub fn insert_file<S: Into<String>>(&self, path: S, bytes: Vec<u8>) {
        self.files.lock().unwrap().insert(path.into(), bytes);
    }

    /// Read a file directly from the store
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    /// Simulate the server becoming unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make subsequent uploads fail with a remote error
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::connectivity("injected connection failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn list(&self, path: &str) -> Result<Vec<String>> {
        self.check_online()?;
        let prefix = format!("{}/", path.trim_end_matches('/'));
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(String::from)
            .collect())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.check_online()?;
        Ok(self.files.lock().unwrap().get(path).cloned())
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.check_online()?;
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::remote("injected upload failure"));
        }
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.check_online()?;
        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    async fn ensure_directory(&self, _path: &str) -> Result<()> {
        self.check_online()
    }
}
