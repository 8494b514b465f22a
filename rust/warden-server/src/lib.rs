#![warn(missing_docs)]

//! The thin HTTP surface over the trust and usage components, plus the
//! process-level glue (key persistence, operator bootstrap) the server
//! binary needs.
//!
//! All authorization decisions live in `warden-trust` and
//! `warden-ledger`; this crate only verifies-and-routes request bodies
//! and maps each typed failure onto a `{error, issues}` 4xx response.

mod admission;
pub use admission::*;

mod api;

mod keys;
pub use keys::*;

mod service;
pub use service::*;
