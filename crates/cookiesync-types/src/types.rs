//! Core data types for cookiesync
//!
//! This module provides the record model shared by every crate in the
//! workspace: one cookie-permission exception rule, the set of rules held by
//! one side of a sync run, and the on-disk/on-wire envelope those sets are
//! stored in.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for sync runs
pub type RunId = uuid::Uuid;

/// Kind of permission exception a record grants
///
/// Part of the record key together with the origin. Only cookie exceptions
/// are synchronized today, but the kind travels with every record so stores
/// holding other permission types stay unambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    /// Cookie storage exception
    Cookie,
}

impl ExceptionKind {
    /// Name used in serialized form and in the profile store's `type` column
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission value carried by an exception record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionValue {
    /// Allow indefinitely
    Allow,
    /// Block
    Block,
    /// Allow for the browsing session only
    AllowSession,
}

impl fmt::Display for PermissionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Allow => "allow",
            Self::Block => "block",
            Self::AllowSession => "allow_session",
        };
        f.write_str(name)
    }
}

/// Expiry policy of an exception record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// The exception never expires
    Never,
    /// The exception expires with the browsing session
    Session,
    /// The exception expires at a fixed point in time
    At(DateTime<Utc>),
}

/// Key uniquely identifying an exception record within a record set
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Origin pattern the exception applies to (e.g. `https://example.org`)
    pub origin: String,
    /// Kind of exception
    pub kind: ExceptionKind,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.origin, self.kind)
    }
}

/// One cookie-permission exception rule
///
/// Records are immutable within a sync run; a change is always a whole-record
/// replacement carrying a fresh `modified` timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    /// Origin pattern the exception applies to
    pub origin: String,
    /// Kind of exception
    pub kind: ExceptionKind,
    /// Permission value
    pub permission: PermissionValue,
    /// Expiry policy
    pub expiry: ExpiryPolicy,
    /// When this record was last modified
    pub modified: DateTime<Utc>,
}

impl ExceptionRecord {
    /// Create a never-expiring cookie exception
    pub fn cookie<S: Into<String>>(
        origin: S,
        permission: PermissionValue,
        modified: DateTime<Utc>,
    ) -> Self {
        Self {
            origin: origin.into(),
            kind: ExceptionKind::Cookie,
            permission,
            expiry: ExpiryPolicy::Never,
            modified,
        }
    }

    /// Key identifying this record within a record set
    pub fn key(&self) -> RecordKey {
        RecordKey {
            origin: self.origin.clone(),
            kind: self.kind,
        }
    }

    /// Content equality used by the reconciliation classification
    ///
    /// Compares permission value and expiry policy only. The `modified`
    /// timestamp is tie-break metadata for the `use_newest` strategy; a
    /// timestamp-only difference is not a modification.
    pub fn same_content(&self, other: &Self) -> bool {
        self.permission == other.permission && self.expiry == other.expiry
    }

    /// Sanity-check a record before it is written to a store
    ///
    /// An origin must look like a URL and the modification time must lie in
    /// a plausible range; anything else indicates a corrupt import file or a
    /// damaged profile.
    pub fn verify(&self) -> bool {
        if !self.origin.contains("://") {
            return false;
        }
        let year = self.modified.year();
        (2000..2100).contains(&year)
    }
}

/// The full collection of exception records held by one side of a sync run
///
/// Keys are unique and unordered; the backing map is ordered only so that
/// serialized output and diff reports are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    records: BTreeMap<RecordKey, ExceptionRecord>,
}

impl RecordSet {
    /// Create an empty record set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in the set
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by key
    pub fn get(&self, key: &RecordKey) -> Option<&ExceptionRecord> {
        self.records.get(key)
    }

    /// Whether a record with the given key exists
    pub fn contains_key(&self, key: &RecordKey) -> bool {
        self.records.contains_key(key)
    }

    /// Insert a record, replacing any previous record with the same key
    pub fn insert(&mut self, record: ExceptionRecord) -> Option<ExceptionRecord> {
        self.records.insert(record.key(), record)
    }

    /// Remove a record by key
    pub fn remove(&mut self, key: &RecordKey) -> Option<ExceptionRecord> {
        self.records.remove(key)
    }

    /// Iterate over the keys in deterministic order
    pub fn keys(&self) -> impl Iterator<Item = &RecordKey> {
        self.records.keys()
    }

    /// Iterate over the records in deterministic key order
    pub fn records(&self) -> impl Iterator<Item = &ExceptionRecord> {
        self.records.values()
    }
}

impl FromIterator<ExceptionRecord> for RecordSet {
    fn from_iter<I: IntoIterator<Item = ExceptionRecord>>(iter: I) -> Self {
        let mut set = Self::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

impl Serialize for RecordSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.records.values())
    }
}

impl<'de> Deserialize<'de> for RecordSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let records = Vec::<ExceptionRecord>::deserialize(deserializer)?;
        Ok(records.into_iter().collect())
    }
}

/// Envelope for a serialized record set, on disk and on the remote store
///
/// The `synced_at` stamp is informational (it shows up in backups and in the
/// remote file); reconciliation depends only on record content and the
/// per-record `modified` timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    /// When this state was written
    pub synced_at: DateTime<Utc>,
    /// The records themselves
    pub records: RecordSet,
}

impl StateFile {
    /// Wrap a record set with the current time
    pub fn now(records: RecordSet) -> Self {
        Self {
            synced_at: Utc::now(),
            records,
        }
    }

    /// Serialize to pretty-printed JSON bytes
    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Deserialize from JSON bytes
    pub fn from_json(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
