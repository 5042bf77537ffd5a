use std::sync::{Arc, Mutex};

use dashmap::DashMap;

/// One mutex per identity.
///
/// Holding an identity's lock serializes every state change for that
/// identity; different identities never contend beyond the map's shards.
#[derive(Default)]
pub struct IdentityLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity's lock cell. Callers lock it for the critical section.
    pub fn cell(&self, identity: &str) -> Arc<Mutex<()>> {
        if let Some(cell) = self.locks.get(identity) {
            return Arc::clone(cell.value());
        }
        Arc::clone(
            self.locks
                .entry(identity.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
