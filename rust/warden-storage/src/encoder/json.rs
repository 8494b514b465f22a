use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::WardenStorageError;

use super::Encoder;

/// An [Encoder] that stores records as JSON. All persisted records in the
/// system go through this encoder, matching the JSON wire format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

#[async_trait]
impl Encoder for JsonEncoder {
    type Error = WardenStorageError;

    async fn encode<T>(&self, record: &T) -> Result<Vec<u8>, Self::Error>
    where
        T: Serialize + Send + Sync + std::fmt::Debug,
    {
        serde_json::to_vec(record)
            .map_err(|error| WardenStorageError::EncodeFailed(format!("{error}")))
    }

    async fn decode<T>(&self, bytes: &[u8]) -> Result<T, Self::Error>
    where
        T: DeserializeOwned + Send,
    {
        serde_json::from_slice::<T>(bytes)
            .map_err(|error| WardenStorageError::DecodeFailed(format!("{error}")))
    }
}
