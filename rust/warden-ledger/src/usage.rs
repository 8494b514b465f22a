use serde::{Deserialize, Serialize};
use warden_common::{MS_SECOND, Timestamp};

/// Entries retained in each bounded account history. Covers the whole
/// freshness window at the enforced ceiling with generous headroom.
pub const MAX_HISTORY_ENTRIES: usize = 4096;

/// One counter per granularity, plus the all-time total.
///
/// These are decaying buckets keyed to the last observed activity, not
/// true sliding windows: a counter resets when at least one whole unit of
/// its granularity has elapsed since the previous update, so a burst
/// straddling a reset boundary can be undercounted relative to a strict
/// rolling window. That approximation is part of the observable contract
/// (it decides ban timing) and is kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowTotals {
    /// Consumption observed within the last second
    pub last_second: u64,
    /// Consumption observed within the last minute
    pub last_minute: u64,
    /// Consumption observed within the last hour
    pub last_hour: u64,
    /// Consumption observed within the last day
    pub last_day: u64,
    /// Consumption observed within the last week (7 days)
    pub last_week: u64,
    /// Consumption observed within the last month (30 days)
    pub last_month: u64,
    /// Consumption observed within the last year (365 days)
    pub last_year: u64,
    /// Consumption observed since the account was created
    pub all_time: u64,
}

/// The server-side record of one signer's consumption.
///
/// Created lazily on a signer's first resource access and never deleted —
/// a banned signer's account remains as evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageAccount {
    /// When the account was last touched
    pub last_update: Timestamp,

    /// Byte counters
    pub total_bytes: WindowTotals,

    /// Request-count counters
    pub total_requests: WindowTotals,

    /// Stringified envelopes of accepted authorizations, oldest first
    pub signed_authorization_history: Vec<String>,

    /// Ids of accepted requests, oldest first; the basis for replay
    /// detection and for ban proofs
    pub request_id_history: Vec<String>,
}

impl UsageAccount {
    /// A fresh account, as created on a signer's first access.
    pub fn new(now: Timestamp) -> Self {
        Self {
            last_update: now,
            total_bytes: WindowTotals::default(),
            total_requests: WindowTotals::default(),
            signed_authorization_history: Vec::new(),
            request_id_history: Vec::new(),
        }
    }

    /// Whether `request_id` was already redeemed against this account.
    pub fn seen(&self, request_id: &str) -> bool {
        self.request_id_history.iter().any(|id| id == request_id)
    }

    /// Account one accepted access: decay the counters, add the event,
    /// and append to the bounded histories.
    pub fn record(
        &mut self,
        now: Timestamp,
        bytes: u64,
        signed_authorization: String,
        request_id: String,
    ) {
        let seconds = now.saturating_sub(self.last_update) / MS_SECOND;
        let minutes = seconds / 60;
        let hours = minutes / 60;
        let days = hours / 24;
        let weeks = days / 7;
        let months = days / 30;
        let years = days / 365;

        if seconds >= 1 {
            self.total_bytes.last_second = 0;
            self.total_requests.last_second = 0;
        }
        if minutes >= 1 {
            self.total_bytes.last_minute = 0;
            self.total_requests.last_minute = 0;
        }
        if hours >= 1 {
            self.total_bytes.last_hour = 0;
            self.total_requests.last_hour = 0;
        }
        if days >= 1 {
            self.total_bytes.last_day = 0;
            self.total_requests.last_day = 0;
        }
        if weeks >= 1 {
            self.total_bytes.last_week = 0;
            self.total_requests.last_week = 0;
        }
        if months >= 1 {
            self.total_bytes.last_month = 0;
            self.total_requests.last_month = 0;
        }
        if years >= 1 {
            self.total_bytes.last_year = 0;
            self.total_requests.last_year = 0;
        }

        self.total_bytes.last_second += bytes;
        self.total_bytes.last_minute += bytes;
        self.total_bytes.last_hour += bytes;
        self.total_bytes.last_day += bytes;
        self.total_bytes.last_week += bytes;
        self.total_bytes.last_month += bytes;
        self.total_bytes.last_year += bytes;
        self.total_bytes.all_time += bytes;

        self.total_requests.last_second += 1;
        self.total_requests.last_minute += 1;
        self.total_requests.last_hour += 1;
        self.total_requests.last_day += 1;
        self.total_requests.last_week += 1;
        self.total_requests.last_month += 1;
        self.total_requests.last_year += 1;
        self.total_requests.all_time += 1;

        self.signed_authorization_history.push(signed_authorization);
        self.request_id_history.push(request_id);
        trim_history(&mut self.signed_authorization_history);
        trim_history(&mut self.request_id_history);

        self.last_update = now;
    }
}

fn trim_history(history: &mut Vec<String>) {
    if history.len() > MAX_HISTORY_ENTRIES {
        let excess = history.len() - MAX_HISTORY_ENTRIES;
        history.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use warden_common::{MS_DAY, MS_MINUTE};

    fn record(account: &mut UsageAccount, now: Timestamp, bytes: u64, id: &str) {
        account.record(now, bytes, format!("authorization-{id}"), id.to_owned());
    }

    #[test]
    fn it_accumulates_within_a_single_second() {
        let mut account = UsageAccount::new(1000);
        record(&mut account, 1000, 100, "a");
        record(&mut account, 1200, 100, "b");

        assert_eq!(account.total_bytes.last_second, 200);
        assert_eq!(account.total_requests.last_second, 2);
        assert_eq!(account.total_bytes.all_time, 200);
    }

    #[test]
    fn it_resets_the_second_bucket_after_a_second_of_quiet() {
        let mut account = UsageAccount::new(1000);
        record(&mut account, 1000, 100, "a");
        record(&mut account, 2100, 100, "b");

        assert_eq!(account.total_bytes.last_second, 100);
        assert_eq!(account.total_bytes.last_minute, 200);
        assert_eq!(account.total_bytes.all_time, 200);
    }

    #[test]
    fn it_resets_each_granularity_independently() {
        let start = 10 * MS_DAY;
        let mut account = UsageAccount::new(start);
        record(&mut account, start, 100, "a");
        record(&mut account, start + 2 * MS_MINUTE, 100, "b");

        assert_eq!(account.total_bytes.last_second, 100);
        assert_eq!(account.total_bytes.last_minute, 100);
        assert_eq!(account.total_bytes.last_hour, 200);
        assert_eq!(account.total_bytes.last_day, 200);
    }

    #[test]
    fn it_always_accumulates_the_all_time_total() {
        let mut account = UsageAccount::new(0);
        record(&mut account, 0, 100, "a");
        record(&mut account, 2 * MS_DAY * 365, 100, "b");

        assert_eq!(account.total_bytes.last_year, 100);
        assert_eq!(account.total_bytes.all_time, 200);
        assert_eq!(account.total_requests.all_time, 2);
    }

    #[test]
    fn it_remembers_redeemed_request_ids() {
        let mut account = UsageAccount::new(0);
        record(&mut account, 0, 100, "a");

        assert!(account.seen("a"));
        assert!(!account.seen("b"));
    }

    #[test]
    fn it_bounds_the_histories() {
        let mut account = UsageAccount::new(0);
        for index in 0..(MAX_HISTORY_ENTRIES + 10) {
            record(&mut account, index as u64, 1, &format!("id-{index}"));
        }

        assert_eq!(account.request_id_history.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(
            account.signed_authorization_history.len(),
            MAX_HISTORY_ENTRIES
        );
        // Oldest entries are the ones discarded
        assert!(!account.seen("id-0"));
        assert!(account.seen(&format!("id-{}", MAX_HISTORY_ENTRIES + 9)));
    }
}
