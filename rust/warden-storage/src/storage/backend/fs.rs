use base58::ToBase58;
use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
};

use async_trait::async_trait;

use crate::WardenStorageError;

use super::{StorageBackend, TransactionalStorageBackend};

/// A basic file-system-based [StorageBackend] implementation. All values
/// are stored inside a root directory as files named after their
/// (base58-encoded) keys, so the store survives a process restart.
///
/// Editions are file modification times, matching what the underlying
/// filesystem can attest without a sidecar index.
#[derive(Clone)]
pub struct FileSystemStorageBackend<Key, Value>
where
    Key: AsRef<[u8]> + Clone,
    Value: AsRef<[u8]> + From<Vec<u8>> + Clone,
{
    root_dir: PathBuf,
    key_type: PhantomData<Key>,
    value_type: PhantomData<Value>,
}

impl<Key, Value> FileSystemStorageBackend<Key, Value>
where
    Key: AsRef<[u8]> + Clone,
    Value: AsRef<[u8]> + From<Vec<u8>> + Clone,
{
    /// Creates a new [`FileSystemStorageBackend`] that stores files in
    /// `root_dir`.
    pub async fn new<Pathlike>(root_dir: Pathlike) -> Result<Self, WardenStorageError>
    where
        Pathlike: AsRef<Path>,
    {
        let root_dir = root_dir.as_ref().to_owned();
        tokio::fs::create_dir_all(&root_dir)
            .await
            .map_err(|error| WardenStorageError::StorageBackend(format!("{error}")))?;
        Ok(Self {
            root_dir,
            key_type: PhantomData,
            value_type: PhantomData,
        })
    }

    fn make_path(&self, key: &Key) -> PathBuf {
        self.root_dir.join(key.as_ref().to_base58())
    }
}

#[async_trait]
impl<Key, Value> StorageBackend for FileSystemStorageBackend<Key, Value>
where
    Key: AsRef<[u8]> + Clone + Send + Sync,
    Value: AsRef<[u8]> + Clone + From<Vec<u8>> + Send + Sync,
{
    type Key = Key;
    type Value = Value;
    type Error = WardenStorageError;

    async fn set(&mut self, key: Self::Key, value: Self::Value) -> Result<(), Self::Error> {
        tokio::fs::write(self.make_path(&key), value)
            .await
            .map_err(|error| WardenStorageError::StorageBackend(format!("{error}")))?;
        Ok(())
    }

    async fn get(&self, key: &Self::Key) -> Result<Option<Self::Value>, Self::Error> {
        let path = self.make_path(key);
        if !path.exists() {
            return Ok(None);
        }

        tokio::fs::read(path)
            .await
            .map(|value| Some(Value::from(value)))
            .map_err(|error| WardenStorageError::StorageBackend(format!("{error}")))
    }
}

#[async_trait]
impl<Key, Value> TransactionalStorageBackend for FileSystemStorageBackend<Key, Value>
where
    Key: AsRef<[u8]> + Clone + Send + Sync,
    Value: AsRef<[u8]> + Clone + From<Vec<u8>> + Send + Sync,
{
    type Address = Key;
    type Value = Value;
    type Error = WardenStorageError;
    type Edition = std::time::SystemTime;

    async fn resolve(
        &self,
        address: &Self::Address,
    ) -> Result<Option<(Self::Value, Self::Edition)>, Self::Error> {
        let path = self.make_path(address);
        if !path.exists() {
            return Ok(None);
        }

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|error| WardenStorageError::StorageBackend(format!("{error}")))?;

        let mtime = metadata
            .modified()
            .map_err(|error| WardenStorageError::StorageBackend(format!("{error}")))?;

        let value = tokio::fs::read(path)
            .await
            .map(Value::from)
            .map_err(|error| WardenStorageError::StorageBackend(format!("{error}")))?;

        Ok(Some((value, mtime)))
    }

    async fn replace(
        &self,
        address: &Self::Address,
        edition: Option<&Self::Edition>,
        content: Option<Self::Value>,
    ) -> Result<Option<Self::Edition>, Self::Error> {
        let path = self.make_path(address);

        let current_mtime = if path.exists() {
            let metadata = tokio::fs::metadata(&path)
                .await
                .map_err(|error| WardenStorageError::StorageBackend(format!("{error}")))?;
            Some(
                metadata
                    .modified()
                    .map_err(|error| WardenStorageError::StorageBackend(format!("{error}")))?,
            )
        } else {
            None
        };

        if current_mtime.as_ref() != edition {
            return Err(WardenStorageError::CasConflict(format!(
                "expected edition {edition:?}, found {current_mtime:?}"
            )));
        }

        match content {
            Some(new_value) => {
                tokio::fs::write(&path, &new_value)
                    .await
                    .map_err(|error| WardenStorageError::StorageBackend(format!("{error}")))?;

                let metadata = tokio::fs::metadata(&path)
                    .await
                    .map_err(|error| WardenStorageError::StorageBackend(format!("{error}")))?;
                let new_mtime = metadata
                    .modified()
                    .map_err(|error| WardenStorageError::StorageBackend(format!("{error}")))?;

                Ok(Some(new_mtime))
            }
            None => {
                if path.exists() {
                    tokio::fs::remove_file(&path)
                        .await
                        .map_err(|error| WardenStorageError::StorageBackend(format!("{error}")))?;
                }
                Ok(None)
            }
        }
    }
}
