use async_trait::async_trait;

use crate::WardenStorageError;

mod fs;
pub use fs::*;

mod memory;
pub use memory::*;

/// A [StorageBackend] is a facade over some generalized storage substrate
/// that is capable of storing and/or retrieving values by some key
#[async_trait]
pub trait StorageBackend: Clone {
    /// The key type used by this [StorageBackend]
    type Key: Send + Sync;
    /// The value type able to be stored by this [StorageBackend]
    type Value: Send;
    /// The error type produced by this [StorageBackend]
    type Error: Into<WardenStorageError>;

    /// Store the given value against the given key
    async fn set(&mut self, key: Self::Key, value: Self::Value) -> Result<(), Self::Error>;
    /// Retrieve a value (if any) stored against the given key
    async fn get(&self, key: &Self::Key) -> Result<Option<Self::Value>, Self::Error>;
}

/// A storage substrate whose entries carry an opaque edition (version
/// identifier), enabling compare-and-set writes.
///
/// An edition is produced on every successful write and must be presented
/// on the next write to the same address; a mismatch means another writer
/// committed in between and the write fails with
/// [`WardenStorageError::CasConflict`] rather than clobbering the newer
/// state. A `None` expected edition asserts the entry is currently absent.
#[async_trait]
pub trait TransactionalStorageBackend {
    /// The address (key) type used by this backend
    type Address: Send + Sync;
    /// The value type able to be stored by this backend
    type Value: Send;
    /// The error type produced by this backend
    type Error: Into<WardenStorageError>;
    /// The opaque per-entry version identifier
    type Edition: Send + Sync;

    /// Load the value and current edition at `address`, if the entry
    /// exists
    async fn resolve(
        &self,
        address: &Self::Address,
    ) -> Result<Option<(Self::Value, Self::Edition)>, Self::Error>;

    /// Conditionally replace the entry at `address`.
    ///
    /// The write commits only if the entry's current edition matches
    /// `edition` (`None` meaning "currently absent"). A `None` `content`
    /// deletes the entry. Returns the new edition, or `None` after a
    /// deletion.
    async fn replace(
        &self,
        address: &Self::Address,
        edition: Option<&Self::Edition>,
        content: Option<Self::Value>,
    ) -> Result<Option<Self::Edition>, Self::Error>;
}
