use thiserror::Error;

use crate::sync::types::SyncErrorKind;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Failures raised by the remote object store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Credentials are no longer valid. Remote work must pause until the
    /// host re-authenticates.
    #[error("Remote store authentication expired: {0}")]
    AuthExpired(String),

    /// Network failure, rate limit, or any other retryable condition.
    #[error("Remote store I/O failed: {0}")]
    TransientIo(String),

    /// The remote body exists but cannot be decoded.
    #[error("Remote object {remote_id} is corrupt: {reason}")]
    Corrupt { remote_id: String, reason: String },

    #[error("Remote object not found: {0}")]
    NotFound(String),

    /// The local value could not be serialized for upload.
    #[error("Failed to encode upload body: {0}")]
    Encode(String),
}

impl StoreError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            StoreError::AuthExpired(_) => SyncErrorKind::Auth,
            StoreError::TransientIo(_) => SyncErrorKind::Transient,
            StoreError::Corrupt { .. } | StoreError::NotFound(_) | StoreError::Encode(_) => {
                SyncErrorKind::Permanent
            }
        }
    }

    /// Corrupt and missing objects are recovered the same way: the remote is
    /// treated as absent and local data is republished.
    pub fn is_absent(&self) -> bool {
        matches!(self, StoreError::Corrupt { .. } | StoreError::NotFound(_))
    }
}

// ---------------------------------------------------------------------------
// DocumentError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document has no numeric \"version\" field")]
    MissingVersion,

    #[error("Unsupported document version {0}")]
    UnsupportedVersion(u64),

    #[error("Malformed document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Duplicate set id \"{0}\"")]
    DuplicateId(String),

    #[error("Invalid timestamp \"{0}\"")]
    InvalidTimestamp(String),
}

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache quota exceeded while writing \"{key}\"")]
    QuotaExceeded { key: String },

    #[error("Cache entry could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    pub fn is_quota(&self) -> bool {
        matches!(self, CacheError::QuotaExceeded { .. })
    }
}

// ---------------------------------------------------------------------------
// SyncError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    /// A previous `AuthExpired` paused remote work; call
    /// `resume_after_reauth` once the host has new credentials.
    #[error("Remote sync is paused until re-authentication")]
    AuthPaused,

    #[error("Set \"{0}\" does not exist")]
    UnknownSet(String),

    #[error("Set \"{0}\" already exists")]
    DuplicateSet(String),

    #[error("Flush queue closed before the task completed")]
    QueueClosed,
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse sync config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// PoseSyncError (top-level rollup)
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PoseSyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, PoseSyncError>;
