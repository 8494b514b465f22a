#![warn(missing_docs)]

//! Usage accounting around the protected resource.
//!
//! Two components share one concept — a per-identity, time-windowed
//! record of consumption:
//!
//! - The [`RequestLimitEvaluator`] decides whether a signed resource
//!   request may proceed against the limits the request itself declares,
//!   then issues a signed [`Authorization`].
//! - The [`UsageEnforcer`] redeems authorizations at the resource server,
//!   meters consumption with rolling counters, and revokes trust when the
//!   fixed server-side ceiling is exceeded.
//!
//! Both take their storage and key material by injection; nothing in this
//! crate is a singleton.

mod enforcer;
pub use enforcer::*;

mod error;
pub use error::*;

mod evaluator;
pub use evaluator::*;

mod events;
pub use events::*;

mod limits;
pub use limits::*;

mod locks;
pub use locks::*;

mod message;
pub use message::*;

mod usage;
pub use usage::*;
