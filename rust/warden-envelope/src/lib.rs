#![warn(missing_docs)]

//! Identities and signed envelopes.
//!
//! An [`Identity`] is the string form of an Ed25519 public key; a
//! [`KeyAuthority`] holds the corresponding private half and can seal
//! payloads into [`Envelope`]s. Verifying an envelope yields the payload
//! (deserialized into an expected schema type) together with the
//! authenticated signer — nothing outside this crate ever touches raw key
//! or signature material.

mod authority;
pub use authority::*;

mod envelope;
pub use envelope::*;

mod error;
pub use error::*;

mod identity;
pub use identity::*;
