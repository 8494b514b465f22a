use thiserror::Error;

/// The common error type used by this crate
#[derive(Error, Debug)]
pub enum WardenStorageError {
    /// An error that occurs while encoding a record
    #[error("Failed to encode a record: {0}")]
    EncodeFailed(String),

    /// An error that occurs while decoding a record
    #[error("Failed to decode a record: {0}")]
    DecodeFailed(String),

    /// An error that occurs when working with a storage backend
    #[error("Storage backend error: {0}")]
    StorageBackend(String),

    /// A compare-and-set write found an edition other than the expected
    /// one; the caller's snapshot is stale
    #[error("Compare-and-set conflict: {0}")]
    CasConflict(String),
}
