use ulid::Ulid;
use warden_common::{MAX_TIMESTAMP_SKEW_MS, Timestamp, is_fresh};
use warden_envelope::{Envelope, EnvelopeError, Identity, KeyAuthority, Verified};
use warden_storage::{Encoder, JsonEncoder, StorageBackend, WardenStorageError};

use crate::{
    Authorization, AuthorizeError, IdentityLocks, LimitSpec, ResourceRequest, SignerLedger,
    UsageEvent,
};

/// Storage key for a signer's event ledger.
fn ledger_key(identity: &Identity) -> Vec<u8> {
    format!("ledger/{identity}").into_bytes()
}

/// Decides whether a signed resource request may proceed against the
/// limits the request declares for itself, and countersigns it into an
/// [`Authorization`] when it may.
///
/// The evaluator keeps one event ledger per request signer. A ledger is
/// only ever mutated by an accepted request; every rejection leaves it
/// untouched. The append-then-prune on acceptance runs under a
/// per-identity lock so concurrent requests from one signer cannot lose
/// each other's events.
#[derive(Clone)]
pub struct RequestLimitEvaluator<Backend> {
    backend: Backend,
    encoder: JsonEncoder,
    authority: KeyAuthority,
    locks: IdentityLocks,
}

impl<Backend> RequestLimitEvaluator<Backend>
where
    Backend: StorageBackend<Key = Vec<u8>, Value = Vec<u8>, Error = WardenStorageError>
        + Clone
        + Send
        + Sync,
{
    /// Create an evaluator that signs authorizations as `authority` and
    /// keeps its ledgers in `backend`.
    pub fn new(backend: Backend, authority: KeyAuthority) -> Self {
        Self {
            backend,
            encoder: JsonEncoder,
            authority,
            locks: IdentityLocks::default(),
        }
    }

    /// The identity this evaluator signs authorizations as.
    pub fn identity(&self) -> &Identity {
        self.authority.identity()
    }

    /// Evaluate `request_envelope` at time `now`.
    ///
    /// `ignore_limits` skips the declared limits (testing only — replay
    /// and freshness checks still apply, and the accepted event is still
    /// recorded).
    pub async fn authorize(
        &self,
        request_envelope: &Envelope,
        now: Timestamp,
        ignore_limits: bool,
    ) -> Result<Envelope, AuthorizeError> {
        let Verified {
            payload: request,
            signer,
        } = request_envelope.verify::<ResourceRequest>().await?;

        // Part of the schema contract, not expressible in the type
        if request.limits.iter().any(|limit| limit.per_ms() == 0) {
            return Err(AuthorizeError::Envelope(EnvelopeError::SchemaInvalid(
                "limit per_ms must be positive".into(),
            )));
        }

        let _guard = self.locks.acquire(&signer).await;

        let key = ledger_key(&signer);
        let mut ledger: SignerLedger = match self.backend.get(&key).await? {
            Some(bytes) => self.encoder.decode(&bytes).await?,
            None => SignerLedger::default(),
        };
        ledger.prune(now);

        if !is_fresh(request.timestamp, now) {
            return Err(AuthorizeError::InvalidTimestamp {
                provided: request.timestamp,
                now,
            });
        }

        if ledger.has_duplicate(now, MAX_TIMESTAMP_SKEW_MS, &request.request_id) {
            return Err(AuthorizeError::DuplicateRequest {
                request_id: request.request_id,
            });
        }

        if !ignore_limits {
            for limit in &request.limits {
                // Limits may cover different windows; each one recomputes
                // its own window statistics.
                let Some(stats) = ledger.window_stats(now, limit.per_ms(), &request.request_id)
                else {
                    return Err(AuthorizeError::DuplicateRequest {
                        request_id: request.request_id,
                    });
                };

                match limit {
                    LimitSpec::Bandwidth { bytes, .. } => {
                        let projected_bytes = stats.bytes + request.size_bytes;
                        if projected_bytes > *bytes {
                            return Err(AuthorizeError::BandwidthLimitExceeded {
                                limit: limit.clone(),
                                window_bytes: stats.bytes,
                                projected_bytes,
                            });
                        }
                    }
                    LimitSpec::Rate { max_requests, .. } => {
                        if stats.requests >= *max_requests {
                            return Err(AuthorizeError::RateLimitExceeded {
                                limit: limit.clone(),
                                window_requests: stats.requests,
                            });
                        }
                    }
                }
            }
        }

        ledger.events.push(UsageEvent {
            timestamp: now,
            bytes: request.size_bytes,
            request_id: request.request_id.clone(),
        });
        let bytes = self.encoder.encode(&ledger).await?;
        let mut backend = self.backend.clone();
        backend.set(key, bytes).await?;

        let authorization = Authorization {
            resource_request: request_envelope.clone(),
            timestamp: now,
            authorize_id: Ulid::new().to_string(),
        };
        Ok(Envelope::seal(&authorization, &self.authority).await?)
    }
}
