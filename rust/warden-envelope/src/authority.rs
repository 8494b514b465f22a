//! Private key material and signing.

use ed25519_dalek::{Signature, SigningKey};
use signature::Signer;

use crate::{Identity, KeyError};

/// An Ed25519 keypair that can seal envelopes as its [`Identity`].
///
/// The signing key never leaves this type except through an explicit
/// [`KeyAuthority::export`] of the seed.
#[derive(Debug, Clone)]
pub struct KeyAuthority {
    identity: Identity,
    key: SigningKey,
}

impl KeyAuthority {
    /// Generate a fresh keypair from platform randomness.
    pub fn generate() -> Result<Self, KeyError> {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed).map_err(KeyError::Rng)?;
        Ok(SigningKey::from_bytes(&seed).into())
    }

    /// Import a keypair from a 32-byte seed.
    pub fn import(seed: &[u8]) -> Result<Self, KeyError> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| KeyError::InvalidSeedLength(seed.len()))?;
        Ok(SigningKey::from_bytes(&seed).into())
    }

    /// Export the raw 32-byte seed.
    pub fn export(&self) -> [u8; 32] {
        self.key.to_bytes()
    }

    /// The identity this authority signs as.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Sign a message, producing a detached signature.
    ///
    /// Signing is async because an authority may be backed by remote or
    /// hardware key material in other deployments; the native path never
    /// suspends.
    pub async fn sign_bytes(&self, msg: &[u8]) -> Result<Signature, signature::Error> {
        self.key.try_sign(msg)
    }
}

impl From<SigningKey> for KeyAuthority {
    fn from(key: SigningKey) -> Self {
        let identity = Identity::from_verifying_key(&key.verifying_key());
        Self { identity, key }
    }
}

impl std::fmt::Display for KeyAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identity)
    }
}
