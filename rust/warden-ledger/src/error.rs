use thiserror::Error;
use warden_common::Timestamp;
use warden_envelope::{EnvelopeError, Identity};
use warden_storage::WardenStorageError;
use warden_trust::TrustError;

use crate::LimitSpec;

/// Failures of a request limit evaluation.
///
/// All variants except `Storage` are request-level outcomes; none of them
/// leave any trace in the signer's ledger.
#[derive(Error, Debug)]
pub enum AuthorizeError {
    /// The request's timestamp falls outside the freshness window
    #[error("Invalid timestamp: {provided} is too far from {now}")]
    InvalidTimestamp {
        /// Timestamp carried by the request
        provided: Timestamp,
        /// The evaluator's clock at the time of the check
        now: Timestamp,
    },

    /// The request id was already consumed
    #[error("Duplicate request: {request_id}")]
    DuplicateRequest {
        /// The repeated id
        request_id: String,
    },

    /// Accepting the request would exceed a declared bandwidth limit
    #[error("Bandwidth limit exceeded: {projected_bytes} bytes projected over {limit:?}")]
    BandwidthLimitExceeded {
        /// The violated limit
        limit: LimitSpec,
        /// Bytes already consumed inside the limit's window
        window_bytes: u64,
        /// Window bytes plus the request's declared size
        projected_bytes: u64,
    },

    /// The declared request-count limit is already saturated
    #[error("Rate limit exceeded: {window_requests} requests against {limit:?}")]
    RateLimitExceeded {
        /// The violated limit
        limit: LimitSpec,
        /// Requests already inside the limit's window
        window_requests: u64,
    },

    /// The request envelope failed verification
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// The ledger's storage substrate failed
    #[error("Storage error: {0}")]
    Storage(#[from] WardenStorageError),
}

/// Failures of redeeming an authorization at the resource server.
#[derive(Error, Debug)]
pub enum ServeError {
    /// The authorization's timestamp falls outside the freshness window
    #[error("Invalid timestamp: {provided} is too far from {now}")]
    InvalidTimestamp {
        /// Timestamp carried by the authorization
        provided: Timestamp,
        /// The server's clock at the time of the check
        now: Timestamp,
    },

    /// The authorization's signer is not a trusted member of the
    /// hierarchy
    #[error("Signer is not eligible to access the resource")]
    NotEligible,

    /// The embedded resource request was issued by somebody other than
    /// this server
    #[error("Resource request was issued by {found}, not by this server")]
    WrongIssuer {
        /// The identity this server serves as
        expected: Identity,
        /// The identity that actually signed the embedded request
        found: Identity,
    },

    /// The embedded request id has already been redeemed.
    ///
    /// Deliberately does not revoke the signer: an intermediary replaying
    /// a captured authorization must not get the original signer banned.
    #[error("Replay detected for request {request_id}")]
    ReplayDetected {
        /// The repeated id
        request_id: String,
    },

    /// The server-side ceiling was exceeded and the signer has been
    /// revoked
    #[error("Rate limit exceeded; {identity} is now banned")]
    RateLimitExceededBanned {
        /// The revoked signer
        identity: Identity,
    },

    /// An envelope failed verification
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// The account's storage substrate failed
    #[error("Storage error: {0}")]
    Storage(#[from] WardenStorageError),

    /// The trust graph could not be consulted
    #[error(transparent)]
    Trust(#[from] TrustError),
}
