use tracing::warn;
use warden_common::{Timestamp, is_fresh};
use warden_envelope::{Envelope, Identity, Verified};
use warden_storage::{
    Encoder, JsonEncoder, StorageBackend, TransactionalStorageBackend, WardenStorageError,
};
use warden_trust::TrustGraphStore;

use crate::{Authorization, IdentityLocks, ResourceRequest, ServeError, UsageAccount};

/// Fixed server-side ceiling on bytes accepted from one signer within the
/// last-second counter. Exceeding it revokes the signer.
pub const MAX_BYTES_PER_SECOND: u64 = 2048;

/// The protected payload released on a successful redemption. A stand-in
/// for real resource retrieval keyed off `resource_url`.
pub const PROTECTED_RESOURCE: &[u8] =
    b"You have reached the protected resource. Spend your bytes wisely.";

/// Storage key for a signer's usage account.
fn account_key(identity: &Identity) -> Vec<u8> {
    format!("usage/{identity}").into_bytes()
}

/// Gates and meters actual resource delivery against previously issued
/// authorizations.
///
/// The enforcer re-validates the authorization (signature, freshness,
/// trust standing, issuer of the embedded request), accounts the access
/// in the signer's rolling usage counters, and revokes the signer's whole
/// subtree when the server-side ceiling is exceeded. The load-update-
/// enforce sequence runs under a per-identity lock so two concurrent
/// requests cannot both read pre-update counters and each conclude "not
/// over limit".
#[derive(Clone)]
pub struct UsageEnforcer<Backend> {
    backend: Backend,
    encoder: JsonEncoder,
    trust: TrustGraphStore<Backend>,
    locks: IdentityLocks,
}

impl<Backend> UsageEnforcer<Backend>
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
    /// Create an enforcer that keeps usage accounts in `backend` and
    /// consults (and revokes through) `trust`.
    pub fn new(backend: Backend, trust: TrustGraphStore<Backend>) -> Self {
        Self {
            backend,
            encoder: JsonEncoder,
            trust,
            locks: IdentityLocks::default(),
        }
    }

    /// Redeem `authorization_envelope` at time `now`, on behalf of the
    /// server identified by `server_identity`.
    pub async fn serve(
        &self,
        authorization_envelope: &Envelope,
        server_identity: &Identity,
        now: Timestamp,
    ) -> Result<&'static [u8], ServeError> {
        let Verified {
            payload: authorization,
            signer,
        } = authorization_envelope.verify::<Authorization>().await?;

        if !is_fresh(authorization.timestamp, now) {
            return Err(ServeError::InvalidTimestamp {
                provided: authorization.timestamp,
                now,
            });
        }

        if self.trust.is_in_good_standing(&signer).await?.is_none() {
            return Err(ServeError::NotEligible);
        }

        let Verified {
            payload: request,
            signer: issuer,
        } = authorization.resource_request.verify::<ResourceRequest>().await?;
        if issuer != *server_identity {
            return Err(ServeError::WrongIssuer {
                expected: server_identity.clone(),
                found: issuer,
            });
        }

        let _guard = self.locks.acquire(&signer).await;

        let key = account_key(&signer);
        let mut account: UsageAccount = match self.backend.get(&key).await? {
            Some(bytes) => self.encoder.decode(&bytes).await?,
            None => UsageAccount::new(now),
        };

        if account.seen(&request.request_id) {
            // No revocation here: an intermediary replaying a captured
            // authorization must not get the original signer banned.
            return Err(ServeError::ReplayDetected {
                request_id: request.request_id,
            });
        }

        let signed_authorization = serde_json::to_string(authorization_envelope)
            .map_err(|error| WardenStorageError::EncodeFailed(error.to_string()))?;
        account.record(now, request.size_bytes, signed_authorization, request.request_id);

        let bytes = self.encoder.encode(&account).await?;
        let mut backend = self.backend.clone();
        backend.set(key, bytes).await?;

        if account.total_bytes.last_second > MAX_BYTES_PER_SECOND {
            let proof = account.request_id_history.join("\n");
            // Best effort: a partially propagated revocation still bans.
            if let Err(error) = self.trust.revoke(&signer, Some(&proof)).await {
                warn!(identity = %signer, %error, "revocation after overage was incomplete");
            }
            return Err(ServeError::RateLimitExceededBanned { identity: signer });
        }

        Ok(PROTECTED_RESOURCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestLimitEvaluator;
    use anyhow::Result;
    use warden_common::{MS_MINUTE, MS_SECOND};
    use warden_envelope::KeyAuthority;
    use warden_storage::MemoryStorageBackend;

    struct Fixture {
        enforcer: UsageEnforcer<MemoryStorageBackend<Vec<u8>, Vec<u8>>>,
        trust: TrustGraphStore<MemoryStorageBackend<Vec<u8>, Vec<u8>>>,
        server: KeyAuthority,
        client: KeyAuthority,
    }

    /// One shared backend, a trust graph with `root -> client`, and a
    /// server authority that issues resource requests.
    async fn fixture() -> Result<Fixture> {
        let backend = MemoryStorageBackend::default();
        let trust = TrustGraphStore::new(backend.clone());
        let server = KeyAuthority::import(&[1u8; 32])?;
        let client = KeyAuthority::import(&[2u8; 32])?;

        let root = Identity::from("did:key:zRoot");
        trust.insert_root(&root, 1).await?;
        trust.admit(&root, client.identity(), 2).await?;

        Ok(Fixture {
            enforcer: UsageEnforcer::new(backend, trust.clone()),
            trust,
            server,
            client,
        })
    }

    /// A client-side evaluator producing an authorization for a request
    /// the server issued, as in the full flow.
    async fn authorization(
        fixture: &Fixture,
        id: &str,
        now: Timestamp,
        size_bytes: u64,
    ) -> Result<Envelope> {
        let request = ResourceRequest {
            resource_url: "/example_expensive_resource".into(),
            timestamp: now,
            limits: Vec::new(),
            size_bytes,
            request_id: id.to_owned(),
        };
        let request_envelope = Envelope::seal(&request, &fixture.server).await?;

        let evaluator =
            RequestLimitEvaluator::new(MemoryStorageBackend::default(), fixture.client.clone());
        Ok(evaluator.authorize(&request_envelope, now, false).await?)
    }

    #[tokio::test]
    async fn it_releases_the_resource_to_an_eligible_signer() -> Result<()> {
        let fixture = fixture().await?;
        let now = 100 * MS_MINUTE;

        let envelope = authorization(&fixture, "req-1", now, 1024).await?;
        let payload = fixture
            .enforcer
            .serve(&envelope, fixture.server.identity(), now)
            .await?;

        assert_eq!(payload, PROTECTED_RESOURCE);

        Ok(())
    }

    #[tokio::test]
    async fn it_rejects_a_stale_authorization() -> Result<()> {
        let fixture = fixture().await?;
        let issued = 100 * MS_MINUTE;

        let envelope = authorization(&fixture, "req-1", issued, 1024).await?;
        let result = fixture
            .enforcer
            .serve(&envelope, fixture.server.identity(), issued + 6 * MS_MINUTE)
            .await;

        assert!(matches!(result, Err(ServeError::InvalidTimestamp { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn it_rejects_a_signer_outside_the_trust_graph() -> Result<()> {
        let fixture = fixture().await?;
        let now = 100 * MS_MINUTE;

        // An authorization signed by an identity with no trust record
        let stranger = KeyAuthority::import(&[9u8; 32])?;
        let request = ResourceRequest {
            resource_url: "/".into(),
            timestamp: now,
            limits: Vec::new(),
            size_bytes: 64,
            request_id: "req-1".into(),
        };
        let request_envelope = Envelope::seal(&request, &fixture.server).await?;
        let evaluator = RequestLimitEvaluator::new(MemoryStorageBackend::default(), stranger);
        let envelope = evaluator.authorize(&request_envelope, now, false).await?;

        let result = fixture
            .enforcer
            .serve(&envelope, fixture.server.identity(), now)
            .await;
        assert!(matches!(result, Err(ServeError::NotEligible)));

        Ok(())
    }

    #[tokio::test]
    async fn it_rejects_a_request_issued_by_another_server() -> Result<()> {
        let fixture = fixture().await?;
        let now = 100 * MS_MINUTE;

        let foreign_issuer = KeyAuthority::import(&[7u8; 32])?;
        let request = ResourceRequest {
            resource_url: "/".into(),
            timestamp: now,
            limits: Vec::new(),
            size_bytes: 64,
            request_id: "req-1".into(),
        };
        let request_envelope = Envelope::seal(&request, &foreign_issuer).await?;
        let evaluator =
            RequestLimitEvaluator::new(MemoryStorageBackend::default(), fixture.client.clone());
        let envelope = evaluator.authorize(&request_envelope, now, false).await?;

        let result = fixture
            .enforcer
            .serve(&envelope, fixture.server.identity(), now)
            .await;
        assert!(matches!(result, Err(ServeError::WrongIssuer { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn it_detects_replay_without_revoking_the_signer() -> Result<()> {
        let fixture = fixture().await?;
        let now = 100 * MS_MINUTE;

        let envelope = authorization(&fixture, "req-1", now, 512).await?;
        fixture
            .enforcer
            .serve(&envelope, fixture.server.identity(), now)
            .await?;

        let result = fixture
            .enforcer
            .serve(&envelope, fixture.server.identity(), now)
            .await;
        assert!(matches!(result, Err(ServeError::ReplayDetected { .. })));

        // The original signer keeps their standing.
        assert!(
            fixture
                .trust
                .is_in_good_standing(fixture.client.identity())
                .await?
                .is_some()
        );

        Ok(())
    }

    #[tokio::test]
    async fn it_bans_a_signer_that_exceeds_the_ceiling_within_a_second() -> Result<()> {
        let fixture = fixture().await?;
        let now = 100 * MS_MINUTE;

        // 1024 + 1024 = 2048 stays at the ceiling...
        for id in ["req-1", "req-2"] {
            let envelope = authorization(&fixture, id, now, 1024).await?;
            fixture
                .enforcer
                .serve(&envelope, fixture.server.identity(), now)
                .await?;
        }

        // ...and the third request in the same second goes over it.
        let envelope = authorization(&fixture, "req-3", now, 1024).await?;
        let result = fixture
            .enforcer
            .serve(&envelope, fixture.server.identity(), now)
            .await;
        assert!(matches!(
            result,
            Err(ServeError::RateLimitExceededBanned { .. })
        ));

        assert!(
            fixture
                .trust
                .is_in_good_standing(fixture.client.identity())
                .await?
                .is_none()
        );

        // The ban proof names the offending requests.
        let node = fixture
            .trust
            .lookup(fixture.client.identity())
            .await?
            .expect("record should remain");
        assert_eq!(node.ban_proof.as_deref(), Some("req-1\nreq-2\nreq-3"));

        Ok(())
    }

    #[tokio::test]
    async fn it_lets_the_second_counter_decay_between_bursts() -> Result<()> {
        let fixture = fixture().await?;
        let now = 100 * MS_MINUTE;

        for id in ["req-1", "req-2"] {
            let envelope = authorization(&fixture, id, now, 1024).await?;
            fixture
                .enforcer
                .serve(&envelope, fixture.server.identity(), now)
                .await?;
        }

        // A second of quiet resets the last-second bucket; the next
        // request is served.
        let later = now + MS_SECOND + 100;
        let envelope = authorization(&fixture, "req-3", later, 1024).await?;
        let payload = fixture
            .enforcer
            .serve(&envelope, fixture.server.identity(), later)
            .await?;

        assert_eq!(payload, PROTECTED_RESOURCE);

        Ok(())
    }

    #[tokio::test]
    async fn it_keeps_the_account_after_a_ban() -> Result<()> {
        let fixture = fixture().await?;
        let now = 100 * MS_MINUTE;

        for (id, expect_ban) in [("req-1", false), ("req-2", false), ("req-3", true)] {
            let envelope = authorization(&fixture, id, now, 1024).await?;
            let result = fixture
                .enforcer
                .serve(&envelope, fixture.server.identity(), now)
                .await;
            assert_eq!(result.is_err(), expect_ban);
        }

        // Even banned, the account persists with its full history as
        // evidence.
        let key = account_key(fixture.client.identity());
        let bytes = fixture
            .enforcer
            .backend
            .get(&key)
            .await?
            .expect("account should persist");
        let account: UsageAccount = fixture.enforcer.encoder.decode(&bytes).await?;

        assert_eq!(account.request_id_history.len(), 3);
        assert_eq!(account.total_bytes.all_time, 3072);

        Ok(())
    }
}
