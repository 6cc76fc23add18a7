//! Error types and handling for cookiesync
//!
//! Every stage of a sync run reports failures through the [`Error`] enum so
//! that the orchestrator can distinguish the abort classes the design calls
//! out: connectivity problems, the panic guard, unresolved conflicts, partial
//! applies, and non-fatal backup failures.

/// Main error type for cookiesync operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Remote store unreachable (connection refused, DNS, timeout)
    #[error("Connectivity error: {message}")]
    Connectivity {
        /// Description of the transport failure
        message: String,
    },

    /// Local record store operation failed
    #[error("Record store error: {message}")]
    Store {
        /// Description of the store failure
        message: String,
    },

    /// Remote store returned an error response (reachable but unhappy)
    #[error("Remote store error: {message}")]
    Remote {
        /// Description of the remote failure
        message: String,
    },

    /// Panic guard tripped: an empty side would overwrite a non-empty base
    #[error("Suspicious empty state: {message}")]
    SuspiciousEmptyState {
        /// Which side looked empty and why that is suspicious
        message: String,
    },

    /// The `do_nothing` strategy left conflicts unresolved
    #[error("{} unresolved conflict(s): {}", conflicts.len(), conflicts.join(", "))]
    UnresolvedConflict {
        /// Keys of the conflicting records, for manual resolution
        conflicts: Vec<String>,
    },

    /// One side was written but the other failed; no new base was persisted
    #[error("Partial apply: {message}")]
    PartialApply {
        /// Which side succeeded and which failed
        message: String,
    },

    /// Backup snapshot could not be taken (non-fatal, the run continues)
    #[error("Backup failure: {message}")]
    Backup {
        /// Description of the backup failure
        message: String,
    },

    /// Snapshot anchor could not be read or written
    #[error("Snapshot error: {message}")]
    Snapshot {
        /// Description of the snapshot failure
        message: String,
    },

    /// Serialization or deserialization of a record set failed
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the codec failure
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration issue
        message: String,
    },

    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Remote unreachable
    Connectivity,
    /// Local store errors
    Store,
    /// Remote content errors
    Remote,
    /// Panic guard
    SuspiciousEmptyState,
    /// Unresolved conflicts under `do_nothing`
    UnresolvedConflict,
    /// One-sided apply
    PartialApply,
    /// Backup failures
    Backup,
    /// Snapshot anchor errors
    Snapshot,
    /// Codec errors
    Serialization,
    /// Configuration errors
    Config,
    /// I/O errors
    Io,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connectivity { .. } => ErrorKind::Connectivity,
            Self::Store { .. } => ErrorKind::Store,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::SuspiciousEmptyState { .. } => ErrorKind::SuspiciousEmptyState,
            Self::UnresolvedConflict { .. } => ErrorKind::UnresolvedConflict,
            Self::PartialApply { .. } => ErrorKind::PartialApply,
            Self::Backup { .. } => ErrorKind::Backup,
            Self::Snapshot { .. } => ErrorKind::Snapshot,
            Self::Serialization { .. } => ErrorKind::Serialization,
            Self::Config { .. } => ErrorKind::Config,
            Self::Io { .. } => ErrorKind::Io,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Whether this error aborts a sync run
    ///
    /// Backup failures are the only kind the orchestrator reports and then
    /// ignores; everything else transitions the run to `ABORTED`.
    pub fn aborts_run(&self) -> bool {
        !matches!(self, Self::Backup { .. })
    }

    /// Create a new connectivity error
    pub fn connectivity<S: Into<String>>(message: S) -> Self {
        Self::Connectivity {
            message: message.into(),
        }
    }

    /// Create a new record store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a new remote store error
    pub fn remote<S: Into<String>>(message: S) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Create a new suspicious-empty-state error
    pub fn suspicious_empty_state<S: Into<String>>(message: S) -> Self {
        Self::SuspiciousEmptyState {
            message: message.into(),
        }
    }

    /// Create a new unresolved-conflict error from the conflicting keys
    pub fn unresolved_conflict(conflicts: Vec<String>) -> Self {
        Self::UnresolvedConflict { conflicts }
    }

    /// Create a new partial-apply error
    pub fn partial_apply<S: Into<String>>(message: S) -> Self {
        Self::PartialApply {
            message: message.into(),
        }
    }

    /// Create a new backup error
    pub fn backup<S: Into<String>>(message: S) -> Self {
        Self::Backup {
            message: message.into(),
        }
    }

    /// Create a new snapshot error
    pub fn snapshot<S: Into<String>>(message: S) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            message: error.to_string(),
        }
    }
}

/// Result type for cookiesync operations
pub type Result<T, E = Error> = std::result::Result<T, E>;
