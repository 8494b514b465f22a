//! String identities naming Ed25519 public keys.

use base58::{FromBase58, ToBase58};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::EnvelopeError;

/// Prefix of the `did:key` string form ('z' is the base58btc multibase tag).
const DID_KEY_PREFIX: &str = "did:key:z";

/// Multicodec tag for an Ed25519 public key, varint-encoded.
const MULTICODEC_ED25519_PUB: [u8; 2] = [0xed, 0x01];

/// The string handle for a signer.
///
/// Identities are compared as exact strings and used as map keys
/// throughout the system; only [`Identity::verifying_key`] interprets the
/// contents. The canonical form is `did:key:z<base58btc(0xed01 ‖ pubkey)>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Derive the canonical identity string for an Ed25519 public key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let mut bytes = Vec::with_capacity(34);
        bytes.extend_from_slice(&MULTICODEC_ED25519_PUB);
        bytes.extend_from_slice(key.as_bytes());
        Identity(format!("{DID_KEY_PREFIX}{}", bytes.to_base58()))
    }

    /// Recover the Ed25519 public key this identity names.
    ///
    /// Fails with [`EnvelopeError::MalformedIdentity`] when the string is
    /// not a well-formed `did:key` Ed25519 identity.
    pub fn verifying_key(&self) -> Result<VerifyingKey, EnvelopeError> {
        let encoded = self
            .0
            .strip_prefix(DID_KEY_PREFIX)
            .ok_or_else(|| EnvelopeError::MalformedIdentity(self.0.clone()))?;

        let bytes = encoded
            .from_base58()
            .map_err(|_| EnvelopeError::MalformedIdentity(self.0.clone()))?;

        let key_bytes = bytes
            .strip_prefix(MULTICODEC_ED25519_PUB.as_slice())
            .ok_or_else(|| EnvelopeError::MalformedIdentity(self.0.clone()))?;

        let key_bytes: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| EnvelopeError::MalformedIdentity(self.0.clone()))?;

        VerifyingKey::from_bytes(&key_bytes)
            .map_err(|_| EnvelopeError::MalformedIdentity(self.0.clone()))
    }

    /// The identity as a plain string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Identity(value)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Identity(value.to_owned())
    }
}

impl FromStr for Identity {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Identity(s.to_owned()))
    }
}
