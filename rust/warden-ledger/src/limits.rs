use serde::{Deserialize, Serialize};

/// A self-declared usage limit carried inside a resource request.
///
/// A request may declare several limits over different windows (for
/// example 100 bytes per second and 1 MB per hour); each is evaluated
/// independently against the signer's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LimitSpec {
    /// At most `bytes` bytes within any rolling window of `per_ms`
    /// milliseconds
    Bandwidth {
        /// Maximum bytes in the window
        bytes: u64,
        /// Window length in milliseconds; must be positive
        per_ms: u64,
    },

    /// At most `max_requests` requests within any rolling window of
    /// `per_ms` milliseconds
    Rate {
        /// Maximum request count in the window
        max_requests: u64,
        /// Window length in milliseconds; must be positive
        per_ms: u64,
    },
}

impl LimitSpec {
    /// The rolling window length this limit covers.
    pub fn per_ms(&self) -> u64 {
        match self {
            LimitSpec::Bandwidth { per_ms, .. } | LimitSpec::Rate { per_ms, .. } => *per_ms,
        }
    }
}
