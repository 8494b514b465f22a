mod backend;
pub use backend::*;

#[cfg(test)]
mod tests {
    use crate::{MemoryStorageBackend, StorageBackend, TransactionalStorageBackend};
    use anyhow::Result;

    #[tokio::test]
    async fn it_writes_and_reads_a_value() -> Result<()> {
        let mut backend = MemoryStorageBackend::default();

        backend.set(vec![1, 2, 3], vec![4, 5, 6]).await?;
        let value = backend.get(&vec![1, 2, 3]).await?;

        assert_eq!(value, Some(vec![4, 5, 6]));

        Ok(())
    }

    #[tokio::test]
    async fn it_shares_state_across_clones() -> Result<()> {
        let mut backend = MemoryStorageBackend::default();
        let observer = backend.clone();

        backend.set(vec![1], vec![2]).await?;

        assert_eq!(observer.get(&vec![1]).await?, Some(vec![2]));

        Ok(())
    }

    #[tokio::test]
    async fn it_round_trips_through_the_transactional_interface() -> Result<()> {
        let backend = MemoryStorageBackend::<Vec<u8>, Vec<u8>>::default();
        let address = b"entry".to_vec();

        let edition = backend.replace(&address, None, Some(vec![1])).await?;
        let Some((value, current)) = backend.resolve(&address).await? else {
            panic!("entry should resolve after creation");
        };

        assert_eq!(value, vec![1]);
        assert_eq!(Some(&current), edition.as_ref());

        Ok(())
    }
}
