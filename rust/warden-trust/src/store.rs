use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use tracing::warn;
use warden_common::Timestamp;
use warden_envelope::Identity;
use warden_storage::{
    Encoder, JsonEncoder, StorageBackend, TransactionalStorageBackend, WardenStorageError,
};

use crate::{TrustError, TrustNode};

/// Storage key for an identity's trust record.
fn node_key(identity: &Identity) -> Vec<u8> {
    format!("user/{identity}").into_bytes()
}

/// The persisted trust hierarchy.
///
/// One record per identity, keyed under a `user/` namespace in the
/// injected backend. Admission is a conditional transaction against the
/// backend's compare-and-set primitive; revocation is a deliberate
/// fan-out of independent per-node writes (see [`TrustGraphStore::revoke`]).
#[derive(Clone)]
pub struct TrustGraphStore<Backend> {
    backend: Backend,
    encoder: JsonEncoder,
}

impl<Backend> TrustGraphStore<Backend>
where
    Backend: StorageBackend<Key = Vec<u8>, Value = Vec<u8>, Error = WardenStorageError>
        + TransactionalStorageBackend<
            Address = Vec<u8>,
            Value = Vec<u8>,
            Error = WardenStorageError,
        > + Clone
        + Send
        + Sync,
{
    /// Wrap the given backend as a trust graph store.
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            encoder: JsonEncoder,
        }
    }

    /// Fetch an identity's trust record, if it has one.
    pub async fn lookup(&self, identity: &Identity) -> Result<Option<TrustNode>, TrustError> {
        let Some(bytes) = self.backend.get(&node_key(identity)).await? else {
            return Ok(None);
        };
        Ok(Some(self.encoder.decode(&bytes).await?))
    }

    /// Fetch an identity's trust record only if it exists and is trusted.
    ///
    /// This is the sole trust gate used by the rest of the system.
    pub async fn is_in_good_standing(
        &self,
        identity: &Identity,
    ) -> Result<Option<TrustNode>, TrustError> {
        Ok(self
            .lookup(identity)
            .await?
            .filter(|node| node.trusted))
    }

    /// Create the root record directly, bypassing the admission path.
    ///
    /// Used by operator bootstrap and tests only; overwrites whatever is
    /// at the root identity's key.
    pub async fn insert_root(
        &self,
        identity: &Identity,
        added_at: Timestamp,
    ) -> Result<(), TrustError> {
        let bytes = self.encoder.encode(&TrustNode::root(added_at)).await?;
        let mut backend = self.backend.clone();
        backend.set(node_key(identity), bytes).await?;
        Ok(())
    }

    /// Admit `new_identity` into the graph under `parent`.
    ///
    /// The parent's trust check, the creation of the new record and the
    /// append to the parent's children all belong to one conditional
    /// transaction: if the parent record changes between our read and our
    /// write, the admission fails with
    /// [`TrustError::ConcurrentModification`] and the new record is
    /// rolled back — never committed against a stale parent snapshot.
    pub async fn admit(
        &self,
        parent: &Identity,
        new_identity: &Identity,
        admitted_at: Timestamp,
    ) -> Result<(), TrustError> {
        let parent_key = node_key(parent);
        let child_key = node_key(new_identity);

        let Some((parent_bytes, parent_edition)) = self.backend.resolve(&parent_key).await? else {
            return Err(TrustError::ParentNotFound);
        };
        let mut parent_node: TrustNode = self.encoder.decode(&parent_bytes).await?;
        if !parent_node.trusted {
            return Err(TrustError::ParentNotTrusted);
        }

        if self.backend.resolve(&child_key).await?.is_some() {
            return Err(TrustError::AlreadyExists);
        }

        let child_node = TrustNode::admitted_under(parent.clone(), admitted_at);
        let child_bytes = self.encoder.encode(&child_node).await?;
        let child_edition = match self.backend.replace(&child_key, None, Some(child_bytes)).await
        {
            Ok(edition) => edition,
            // Lost a creation race for the same identity
            Err(WardenStorageError::CasConflict(_)) => return Err(TrustError::AlreadyExists),
            Err(error) => return Err(error.into()),
        };

        parent_node.children.push(new_identity.clone());
        let parent_bytes = self.encoder.encode(&parent_node).await?;
        match self
            .backend
            .replace(&parent_key, Some(&parent_edition), Some(parent_bytes))
            .await
        {
            Ok(_) => Ok(()),
            Err(WardenStorageError::CasConflict(_)) => {
                // The parent moved under us; withdraw the orphaned child
                // record before surfacing the conflict to the caller.
                if let Err(error) = self
                    .backend
                    .replace(&child_key, child_edition.as_ref(), None)
                    .await
                {
                    warn!(
                        identity = %new_identity,
                        %error,
                        "failed to roll back child record after admission conflict"
                    );
                }
                Err(TrustError::ConcurrentModification)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Mark `identity` untrusted and propagate to all of its descendants.
    ///
    /// A no-op when the identity has no record. Each descendant is
    /// revoked by an independent write dispatched concurrently, carrying
    /// the same `proof`. The subtree as a whole is therefore *not*
    /// revoked atomically: a reader may observe an intermediate state
    /// where an ancestor is untrusted while some descendant still is.
    /// Propagation is eventual, and per-child failures are logged rather
    /// than unwound.
    pub async fn revoke(&self, identity: &Identity, proof: Option<&str>) -> Result<(), TrustError> {
        self.revoke_subtree(identity.clone(), proof.map(str::to_owned))
            .await
    }

    fn revoke_subtree(
        &self,
        identity: Identity,
        proof: Option<String>,
    ) -> BoxFuture<'_, Result<(), TrustError>> {
        async move {
            let key = node_key(&identity);
            let Some(bytes) = self.backend.get(&key).await? else {
                return Ok(());
            };
            let mut node: TrustNode = self.encoder.decode(&bytes).await?;

            node.trusted = false;
            if let Some(proof) = &proof {
                node.ban_proof = Some(proof.clone());
            }

            let bytes = self.encoder.encode(&node).await?;
            let mut backend = self.backend.clone();
            backend.set(key, bytes).await?;

            let revocations = node
                .children
                .into_iter()
                .map(|child| self.revoke_subtree(child, proof.clone()));
            for result in join_all(revocations).await {
                if let Err(error) = result {
                    warn!(%error, "failed to revoke a descendant");
                }
            }

            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use warden_storage::MemoryStorageBackend;

    fn test_store() -> TrustGraphStore<MemoryStorageBackend<Vec<u8>, Vec<u8>>> {
        TrustGraphStore::new(MemoryStorageBackend::default())
    }

    fn identity(name: &str) -> Identity {
        Identity::from(format!("did:key:z{name}"))
    }

    #[tokio::test]
    async fn it_reports_unknown_identities_as_absent() -> Result<()> {
        let store = test_store();

        assert!(store.lookup(&identity("nobody")).await?.is_none());
        assert!(
            store
                .is_in_good_standing(&identity("nobody"))
                .await?
                .is_none()
        );

        Ok(())
    }

    #[tokio::test]
    async fn it_admits_a_member_under_a_trusted_root() -> Result<()> {
        let store = test_store();
        let root = identity("root");
        let member = identity("member");

        store.insert_root(&root, 1).await?;
        store.admit(&root, &member, 2).await?;

        let node = store
            .is_in_good_standing(&member)
            .await?
            .expect("member should be in good standing");
        assert!(node.trusted);
        assert_eq!(node.parent, Some(root.clone()));
        assert_eq!(node.added_at, 2);

        let root_node = store.lookup(&root).await?.expect("root should exist");
        assert_eq!(root_node.children, vec![member]);

        Ok(())
    }

    #[tokio::test]
    async fn it_refuses_admission_under_an_unknown_parent() -> Result<()> {
        let store = test_store();

        let result = store
            .admit(&identity("ghost"), &identity("member"), 1)
            .await;
        assert!(matches!(result, Err(TrustError::ParentNotFound)));

        Ok(())
    }

    #[tokio::test]
    async fn it_refuses_admission_under_a_revoked_parent() -> Result<()> {
        let store = test_store();
        let root = identity("root");
        let parent = identity("parent");

        store.insert_root(&root, 1).await?;
        store.admit(&root, &parent, 2).await?;
        store.revoke(&parent, None).await?;

        let result = store.admit(&parent, &identity("member"), 3).await;
        assert!(matches!(result, Err(TrustError::ParentNotTrusted)));

        Ok(())
    }

    #[tokio::test]
    async fn it_refuses_to_admit_the_same_identity_twice() -> Result<()> {
        let store = test_store();
        let root = identity("root");
        let member = identity("member");

        store.insert_root(&root, 1).await?;
        store.admit(&root, &member, 2).await?;

        let result = store.admit(&root, &member, 3).await;
        assert!(matches!(result, Err(TrustError::AlreadyExists)));

        Ok(())
    }

    #[tokio::test]
    async fn it_admits_each_contested_identity_exactly_once() -> Result<()> {
        let store = test_store();
        let root = identity("root");
        store.insert_root(&root, 1).await?;

        // Several parents racing to admit the same new identity: exactly
        // one admission may win, regardless of interleaving.
        let mut parents = Vec::new();
        for index in 0..4 {
            let parent = identity(&format!("parent{index}"));
            store.admit(&root, &parent, 2).await?;
            parents.push(parent);
        }

        let contested = identity("contested");
        let mut tasks = tokio::task::JoinSet::new();
        for parent in parents {
            let store = store.clone();
            let contested = contested.clone();
            tasks.spawn(async move { store.admit(&parent, &contested, 3).await });
        }

        let mut successes = 0;
        while let Some(result) = tasks.join_next().await {
            if result?.is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert!(store.is_in_good_standing(&contested).await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn it_revokes_a_whole_subtree_and_nothing_else() -> Result<()> {
        let store = test_store();
        let root = identity("root");
        let left = identity("left");
        let left_child = identity("left-child");
        let left_grandchild = identity("left-grandchild");
        let right = identity("right");

        store.insert_root(&root, 1).await?;
        store.admit(&root, &left, 2).await?;
        store.admit(&root, &right, 3).await?;
        store.admit(&left, &left_child, 4).await?;
        store.admit(&left_child, &left_grandchild, 5).await?;

        store.revoke(&left, Some("observed abuse")).await?;

        for revoked in [&left, &left_child, &left_grandchild] {
            let node = store.lookup(revoked).await?.expect("node should remain");
            assert!(!node.trusted);
            assert_eq!(node.ban_proof.as_deref(), Some("observed abuse"));
            assert!(store.is_in_good_standing(revoked).await?.is_none());
        }

        assert!(store.is_in_good_standing(&root).await?.is_some());
        assert!(store.is_in_good_standing(&right).await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn it_treats_revocation_of_an_unknown_identity_as_a_no_op() -> Result<()> {
        let store = test_store();

        store.revoke(&identity("nobody"), Some("proof")).await?;

        Ok(())
    }

    #[tokio::test]
    async fn it_keeps_revoked_records_in_the_graph() -> Result<()> {
        let store = test_store();
        let root = identity("root");

        store.insert_root(&root, 1).await?;
        store.revoke(&root, None).await?;

        let node = store.lookup(&root).await?.expect("record should remain");
        assert!(!node.trusted);
        assert!(node.ban_proof.is_none());

        Ok(())
    }
}
