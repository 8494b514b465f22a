//! The signed admission flow behind `POST /add_user`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_common::{Timestamp, is_fresh};
use warden_envelope::{Envelope, EnvelopeError, Identity, Verified};
use warden_storage::{StorageBackend, TransactionalStorageBackend, WardenStorageError};
use warden_trust::{TrustError, TrustGraphStore};

/// A request to admit `user_id` into the trust graph, signed by the
/// admitting member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRequest {
    /// Unique id of this admission request
    pub request_id: String,

    /// The identity being admitted
    pub user_id: Identity,

    /// When the request was created; checked against the freshness
    /// window and recorded as the new member's admission time
    pub timestamp: Timestamp,
}

/// Failures of the admission flow.
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// The admission request's timestamp falls outside the freshness
    /// window
    #[error("Invalid timestamp: {provided} is too far from {now}")]
    InvalidTimestamp {
        /// Timestamp carried by the request
        provided: Timestamp,
        /// The server's clock at the time of the check
        now: Timestamp,
    },

    /// The signer is not a trusted member and may not admit anyone
    #[error("Signer is not eligible to admit users")]
    NotEligible,

    /// The envelope failed verification
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// The trust graph refused the admission
    #[error(transparent)]
    Trust(#[from] TrustError),
}

/// Verify an admission envelope and admit the named identity under its
/// signer.
pub async fn admit_user<Backend>(
    trust: &TrustGraphStore<Backend>,
    envelope: &Envelope,
    now: Timestamp,
) -> Result<(), AdmissionError>
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
    let Verified {
        payload: request,
        signer,
    } = envelope.verify::<AdmissionRequest>().await?;

    if !is_fresh(request.timestamp, now) {
        return Err(AdmissionError::InvalidTimestamp {
            provided: request.timestamp,
            now,
        });
    }

    if trust.is_in_good_standing(&signer).await?.is_none() {
        return Err(AdmissionError::NotEligible);
    }

    trust
        .admit(&signer, &request.user_id, request.timestamp)
        .await?;

    Ok(())
}
