use serde::{Deserialize, Serialize};
use warden_common::Timestamp;
use warden_envelope::Envelope;

use crate::LimitSpec;

/// A request for the protected resource, sealed in an envelope by the
/// issuing gatekeeper and later redeemed against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// The resource being requested
    pub resource_url: String,

    /// When the request was created; checked against the freshness window
    pub timestamp: Timestamp,

    /// The limits this request declares for itself, evaluated in order
    pub limits: Vec<LimitSpec>,

    /// The declared cost of serving this request, in bytes
    pub size_bytes: u64,

    /// Unique id; the basis for replay detection
    pub request_id: String,
}

/// The artifact produced by a successful limit evaluation: the original
/// resource request envelope, countersigned with a fresh id. Redeeming it
/// at the resource server releases the resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// The resource request envelope this authorization covers
    pub resource_request: Envelope,

    /// When the authorization was issued
    pub timestamp: Timestamp,

    /// Unique id of this authorization
    pub authorize_id: String,
}
