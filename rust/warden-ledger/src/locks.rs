use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use warden_envelope::Identity;

/// A registry of per-identity async mutexes.
///
/// Read-modify-write sequences on a signer's ledger or usage account must
/// be mutually exclusive for that signer while leaving other signers
/// fully parallel; acquiring here scopes the exclusion to exactly one
/// identity. Lock entries are never removed — one mutex per identity ever
/// seen is the registry's working set.
#[derive(Clone, Default)]
pub struct IdentityLocks {
    locks: Arc<DashMap<Identity, Arc<Mutex<()>>>>,
}

impl IdentityLocks {
    /// Acquire the mutex for `identity`, creating it on first use.
    pub async fn acquire(&self, identity: &Identity) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(identity.clone()).or_default().clone();
        lock.lock_owned().await
    }
}
