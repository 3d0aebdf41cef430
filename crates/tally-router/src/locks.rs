use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tally_types::ClientId;

use crate::error::RoutingError;

/// One mutex per client identity.
///
/// Commands for the same client serialize on that client's mutex; commands
/// for different clients never contend beyond the brief map lookup.
#[derive(Default)]
pub struct ClientLocks {
    locks: Mutex<HashMap<ClientId, Arc<Mutex<()>>>>,
}

impl ClientLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex guarding `client`, created on first use.
    ///
    /// Creating an entry first drops every entry nobody holds a handle to,
    /// so the map tracks in-flight clients rather than every client seen.
    pub fn handle(&self, client: &ClientId) -> Result<Arc<Mutex<()>>, RoutingError> {
        let mut locks = self.locks.lock().map_err(|_| RoutingError::LockPoisoned)?;
        if let Some(lock) = locks.get(client) {
            return Ok(Arc::clone(lock));
        }
        // Handles are only cloned under the map lock, so a count of one
        // cannot rise while we hold it.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(Arc::clone(locks.entry(client.clone()).or_default()))
    }

    pub fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
