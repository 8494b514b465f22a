#![warn(missing_docs)]

//! The trust graph: a persisted tree of identities rooted at a bootstrap
//! identity, where membership is granted by existing trusted members and
//! withdrawn by recursive revocation.
//!
//! The graph lives in a flat keyed store — one record per identity,
//! parent/children expressed as identities keying other records — and all
//! membership mutation goes through the store's compare-and-set
//! primitive, so a stale snapshot of the graph can never be silently
//! written back.

mod error;
pub use error::*;

mod node;
pub use node::*;

mod store;
pub use store::*;
