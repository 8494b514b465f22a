use serde::{Deserialize, Serialize};
use warden_common::{MAX_WINDOW_MS, Timestamp};

/// One accepted request, as remembered by a signer's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// When the request was accepted
    pub timestamp: Timestamp,

    /// The declared cost of the request, in bytes
    pub bytes: u64,

    /// The request's unique id
    pub request_id: String,
}

/// Aggregate statistics over one rolling window of a signer's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowStats {
    /// Events inside the window
    pub requests: u64,

    /// Byte sum of events inside the window
    pub bytes: u64,
}

/// The per-signer sequence of accepted requests, oldest first.
///
/// All window computations scan newest to oldest and stop at the first
/// event older than the window, so the cost of a check is proportional to
/// the window, not to the retained history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerLedger {
    /// Accepted events, oldest first
    pub events: Vec<UsageEvent>,
}

impl SignerLedger {
    /// Drop events older than the global retention ceiling.
    pub fn prune(&mut self, now: Timestamp) {
        let cutoff = now.saturating_sub(MAX_WINDOW_MS);
        self.events.retain(|event| event.timestamp >= cutoff);
    }

    /// Whether `request_id` already occurs within the given window.
    pub fn has_duplicate(&self, now: Timestamp, window_ms: u64, request_id: &str) -> bool {
        let cutoff = now.saturating_sub(window_ms);
        for event in self.events.iter().rev() {
            if event.request_id == request_id {
                return true;
            }
            if event.timestamp < cutoff {
                break;
            }
        }
        false
    }

    /// Event count and byte sum over `[now - window_ms, now]`.
    ///
    /// Returns `None` when `current_request_id` is re-encountered inside
    /// the window — the caller is looking at a replayed id and must not
    /// treat the scan as a usable total.
    pub fn window_stats(
        &self,
        now: Timestamp,
        window_ms: u64,
        current_request_id: &str,
    ) -> Option<WindowStats> {
        let cutoff = now.saturating_sub(window_ms);
        let mut stats = WindowStats::default();
        for event in self.events.iter().rev() {
            if event.request_id == current_request_id {
                return None;
            }
            if event.timestamp < cutoff {
                break;
            }
            stats.requests += 1;
            stats.bytes += event.bytes;
        }
        Some(stats)
    }
}
