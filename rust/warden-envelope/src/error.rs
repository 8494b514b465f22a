use thiserror::Error;

/// Errors produced when sealing or verifying an [`Envelope`].
///
/// [`Envelope`]: crate::Envelope
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// The signer string could not be interpreted as a public key
    #[error("Malformed identity: {0}")]
    MalformedIdentity(String),

    /// The signature does not verify against the carried payload bytes
    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),

    /// The payload bytes did not decode into the expected schema type
    #[error("Payload does not match the expected schema: {0}")]
    SchemaInvalid(String),

    /// The payload could not be serialized for signing
    #[error("Failed to encode payload: {0}")]
    EncodeFailed(String),
}

/// Errors produced when generating or importing key material.
#[derive(Error, Debug)]
pub enum KeyError {
    /// A seed of the wrong length was offered for import
    #[error("Expected a 32-byte seed, got {0} bytes")]
    InvalidSeedLength(usize),

    /// The platform randomness source failed
    #[error("Random source failed: {0}")]
    Rng(getrandom::Error),
}
