#![warn(missing_docs)]

//! Light weight helpers shared across the other `warden-*` crates. Their
//! chief quality is that they have no dependencies at all.

mod time;
pub use time::*;
