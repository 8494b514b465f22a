#![warn(missing_docs)]

//! Generalized API for keyed storage with optional compare-and-set
//! semantics, shared by the trust graph and the usage ledgers.
//!
//! A [`StorageBackend`] stores and retrieves values by key. A
//! [`TransactionalStorageBackend`] additionally tracks an opaque
//! [`Edition`] per entry, so read-modify-write sequences can detect (and
//! surface) concurrent modification instead of silently acting on stale
//! state. An [`Encoder`] converts typed records to and from the stored
//! bytes:
//!
//! ```rust
//! use warden_storage::{JsonEncoder, MemoryStorageBackend};
//!
//! let encoder = JsonEncoder;
//! let backend = MemoryStorageBackend::<Vec<u8>, Vec<u8>>::default();
//! ```
//!
//! [`Edition`]: TransactionalStorageBackend::Edition

mod encoder;
pub use encoder::*;

mod error;
pub use error::*;

mod storage;
pub use storage::*;
