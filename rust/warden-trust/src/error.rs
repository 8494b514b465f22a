use thiserror::Error;
use warden_storage::WardenStorageError;

/// Errors produced by trust graph operations.
///
/// Every variant except `Storage` is a request-level outcome: the graph
/// itself is intact and the caller simply may not perform the mutation it
/// asked for.
#[derive(Error, Debug)]
pub enum TrustError {
    /// The admitting identity has no trust record
    #[error("Admitting identity is not known to the trust graph")]
    ParentNotFound,

    /// The admitting identity exists but is no longer trusted
    #[error("Admitting identity is not trusted")]
    ParentNotTrusted,

    /// The identity being admitted already has a trust record
    #[error("Identity already exists in the trust graph")]
    AlreadyExists,

    /// Another writer committed to the parent record between our read and
    /// our write; the caller may retry against fresh state
    #[error("Trust record was concurrently modified")]
    ConcurrentModification,

    /// The storage substrate failed
    #[error("Storage error: {0}")]
    Storage(#[from] WardenStorageError),
}
