//! Error type for storage engine operations.

use thiserror::Error;

use crate::codec::CodecError;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The store file could not be opened (lock contention, unreadable file).
    #[error("failed to open store: {0}")]
    Open(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A legacy layout was found and rewriting it was not authorised.
    #[error("detected old DB schema version {detected}, want {required}; requires allow_rewrite to proceed")]
    SchemaMismatch { detected: u64, required: u64 },

    #[error("unsupported DB schema version {0}")]
    UnsupportedVersion(u64),

    #[error("metadata table has no schema version")]
    CorruptMetadata,

    #[error("store uses {stored} ns windows, configured {configured} ns")]
    WindowSizeMismatch { stored: u64, configured: u64 },

    #[error("window size must be positive and fit in 64-bit nanoseconds, got {0}")]
    InvalidWindowSize(time::Duration),

    #[error("timestamp {0} ns has no representable storage window")]
    KeyOutOfRange(i64),

    #[error("storage engine has stopped")]
    EngineStopped,
}
