//! The signed envelope wrapping every message in the system.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::Signature;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use signature::Verifier;

use crate::{EnvelopeError, Identity, KeyAuthority};

/// A signed, schema-checked message.
///
/// The payload travels as the exact bytes that were signed (base64 on the
/// wire), so verification never depends on re-serialization being
/// canonical. [`Envelope::verify`] authenticates those bytes against the
/// claimed signer and only then deserializes them into the expected
/// schema type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Base64 of the serialized payload; the signature covers exactly
    /// these bytes.
    pub payload: String,

    /// The identity claiming to have produced the signature.
    pub signer: Identity,

    /// Base64 of the detached Ed25519 signature.
    pub signature: String,
}

/// The outcome of successful verification: the decoded payload plus the
/// authenticated signer.
#[derive(Debug, Clone)]
pub struct Verified<T> {
    /// The payload, deserialized into the expected schema type.
    pub payload: T,

    /// The signer whose signature checked out.
    pub signer: Identity,
}

impl Envelope {
    /// Serialize `payload` and sign it as `authority`.
    pub async fn seal<T>(payload: &T, authority: &KeyAuthority) -> Result<Self, EnvelopeError>
    where
        T: Serialize,
    {
        let bytes = serde_json::to_vec(payload)
            .map_err(|error| EnvelopeError::EncodeFailed(error.to_string()))?;

        let signature = authority
            .sign_bytes(&bytes)
            .await
            .map_err(|error| EnvelopeError::EncodeFailed(error.to_string()))?;

        Ok(Envelope {
            payload: BASE64.encode(&bytes),
            signer: authority.identity().clone(),
            signature: BASE64.encode(signature.to_bytes()),
        })
    }

    /// Authenticate the envelope and decode its payload as a `T`.
    ///
    /// The signer string is resolved to a public key, the signature is
    /// checked over the carried payload bytes, and finally the bytes are
    /// deserialized — so a [`Verified`] result always means "this exact
    /// payload was produced by this signer".
    pub async fn verify<T>(&self) -> Result<Verified<T>, EnvelopeError>
    where
        T: DeserializeOwned,
    {
        let payload_bytes = BASE64
            .decode(&self.payload)
            .map_err(|error| EnvelopeError::SchemaInvalid(format!("payload: {error}")))?;

        let signature_bytes = BASE64
            .decode(&self.signature)
            .map_err(|error| EnvelopeError::SignatureInvalid(error.to_string()))?;
        let signature = Signature::try_from(signature_bytes.as_slice())
            .map_err(|error| EnvelopeError::SignatureInvalid(error.to_string()))?;

        let key = self.signer.verifying_key()?;
        key.verify(&payload_bytes, &signature)
            .map_err(|error| EnvelopeError::SignatureInvalid(error.to_string()))?;

        let payload = serde_json::from_slice(&payload_bytes)
            .map_err(|error| EnvelopeError::SchemaInvalid(error.to_string()))?;

        Ok(Verified {
            payload,
            signer: self.signer.clone(),
        })
    }
}
