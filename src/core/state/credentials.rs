//! Short-lived cache for fleet-role credentials.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::core::model::GetFleetRoleCredentialsResponse;

/// A cached entry is only served while it has this much lifetime left;
/// below the threshold it is evicted on read and refetched.
const MIN_REMAINING_MS: i64 = 15 * 60 * 1000;

struct CacheEntry {
    response: GetFleetRoleCredentialsResponse,
    expiration_ms: i64,
}

/// Role-ARN keyed credential cache. Read-evict-and-insert all happen under
/// one mutex.
#[derive(Default)]
pub struct FleetRoleCredentialCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl FleetRoleCredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached credentials for `role_arn`, if they still have enough
    /// lifetime left. A stale entry is evicted.
    pub fn get(&self, role_arn: &str, now_ms: i64) -> Option<GetFleetRoleCredentialsResponse> {
        let mut entries = self.entries.lock();
        match entries.get(role_arn) {
            Some(entry) if entry.expiration_ms - now_ms > MIN_REMAINING_MS => {
                Some(entry.response.clone())
            }
            Some(_) => {
                debug!(role_arn, "Cached credentials expiring soon, evicting");
                entries.remove(role_arn);
                None
            }
            None => None,
        }
    }

    /// Install credentials after a successful backend fetch.
    pub fn insert(&self, role_arn: String, response: GetFleetRoleCredentialsResponse) {
        let expiration_ms = response.expiration;
        self.entries.lock().insert(role_arn, CacheEntry { response, expiration_ms });
    }
}
