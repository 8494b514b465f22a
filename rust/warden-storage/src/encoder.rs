use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::WardenStorageError;

mod json;
pub use json::*;

/// An [Encoder] converts typed records to and from stored bytes
#[async_trait]
pub trait Encoder: Clone {
    /// The error type produced by this [Encoder]
    type Error: Into<WardenStorageError>;

    /// Encode a serializable record into bytes.
    async fn encode<T>(&self, record: &T) -> Result<Vec<u8>, Self::Error>
    where
        T: Serialize + Send + Sync + std::fmt::Debug;

    /// Decode bytes into some deserializable type.
    async fn decode<T>(&self, bytes: &[u8]) -> Result<T, Self::Error>
    where
        T: DeserializeOwned + Send;
}
