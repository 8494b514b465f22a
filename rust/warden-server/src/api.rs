//! Mapping from component failures to HTTP `{error, issues}` responses.
//!
//! Every request-level failure kind maps to a 4xx with a stable error
//! string and supporting issue data; only genuinely unexpected failures
//! (storage, encoding) become 5xx.

use hyper::StatusCode;
use serde_json::{Value, json};
use warden_envelope::EnvelopeError;
use warden_ledger::{AuthorizeError, ServeError};
use warden_trust::TrustError;

use crate::AdmissionError;

/// A failure ready to be rendered as an HTTP response.
pub(crate) struct Failure {
    pub status: StatusCode,
    pub error: &'static str,
    pub issues: Value,
}

impl Failure {
    fn bad_request(error: &'static str, issues: Value) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
            issues,
        }
    }

    fn server_error(detail: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Server Error",
            issues: json!([{ "detail": detail }]),
        }
    }
}

pub(crate) fn from_envelope(error: EnvelopeError) -> Failure {
    match error {
        EnvelopeError::MalformedIdentity(identity) => {
            Failure::bad_request("Malformed Identity", json!([{ "identity": identity }]))
        }
        EnvelopeError::SignatureInvalid(detail) => {
            Failure::bad_request("Invalid Signature", json!([{ "detail": detail }]))
        }
        EnvelopeError::SchemaInvalid(detail) => {
            Failure::bad_request("Invalid Request Schema", json!([{ "detail": detail }]))
        }
        EnvelopeError::EncodeFailed(detail) => Failure::server_error(detail),
    }
}

pub(crate) fn from_authorize(error: AuthorizeError) -> Failure {
    match error {
        AuthorizeError::InvalidTimestamp { provided, now } => Failure::bad_request(
            "Invalid Timestamp",
            json!([{ "provided": provided, "now": now }]),
        ),
        AuthorizeError::DuplicateRequest { request_id } => Failure::bad_request(
            "Duplicate Request",
            json!([{ "request_id": request_id }]),
        ),
        AuthorizeError::BandwidthLimitExceeded {
            limit,
            window_bytes,
            projected_bytes,
        } => Failure::bad_request(
            "Bandwidth Limit Exceeded",
            json!([{
                "limit": limit,
                "window_bytes": window_bytes,
                "projected_bytes": projected_bytes,
            }]),
        ),
        AuthorizeError::RateLimitExceeded {
            limit,
            window_requests,
        } => Failure::bad_request(
            "Rate Limit Exceeded",
            json!([{ "limit": limit, "window_requests": window_requests }]),
        ),
        AuthorizeError::Envelope(error) => from_envelope(error),
        AuthorizeError::Storage(error) => Failure::server_error(error.to_string()),
    }
}

pub(crate) fn from_serve(error: ServeError) -> Failure {
    match error {
        ServeError::InvalidTimestamp { provided, now } => Failure::bad_request(
            "Invalid Timestamp",
            json!([{ "provided": provided, "now": now }]),
        ),
        ServeError::NotEligible => Failure::bad_request(
            "User Not Eligible",
            json!([{ "detail": "signer is not a trusted member" }]),
        ),
        ServeError::WrongIssuer { expected, found } => Failure::bad_request(
            "Wrong Issuer",
            json!([{ "expected": expected, "found": found }]),
        ),
        ServeError::ReplayDetected { request_id } => Failure::bad_request(
            "Replay Detected",
            json!([{ "request_id": request_id }]),
        ),
        ServeError::RateLimitExceededBanned { identity } => Failure::bad_request(
            "Rate Limit Exceeded - Banned",
            json!([{ "identity": identity }]),
        ),
        ServeError::Envelope(error) => from_envelope(error),
        ServeError::Storage(error) => Failure::server_error(error.to_string()),
        ServeError::Trust(error) => Failure::server_error(error.to_string()),
    }
}

pub(crate) fn from_admission(error: AdmissionError) -> Failure {
    match error {
        AdmissionError::InvalidTimestamp { provided, now } => Failure::bad_request(
            "Invalid Timestamp",
            json!([{ "provided": provided, "now": now }]),
        ),
        AdmissionError::NotEligible => Failure::bad_request(
            "User Not Eligible",
            json!([{ "detail": "signer is not a trusted member" }]),
        ),
        AdmissionError::Envelope(error) => from_envelope(error),
        AdmissionError::Trust(error) => match error {
            TrustError::ParentNotFound => {
                Failure::bad_request("User Not Eligible", json!([]))
            }
            TrustError::ParentNotTrusted => {
                Failure::bad_request("User Not Eligible", json!([]))
            }
            TrustError::AlreadyExists => Failure::bad_request("User Already Exists", json!([])),
            TrustError::ConcurrentModification => Failure::bad_request(
                "Concurrent Modification",
                json!([{ "detail": "retry the admission against fresh state" }]),
            ),
            TrustError::Storage(error) => Failure::server_error(error.to_string()),
        },
    }
}
