//! In-memory cache of role claims keyed by user id.

use std::time::Duration;

use moka::future::Cache;
use tracing::debug;
use uuid::Uuid;

const MAX_ENTRIES: u64 = 10_000;

/// Injected role-claim cache. Entries may be stale relative to the stored
/// profile; callers that learn a claim is wrong invalidate it.
#[derive(Clone)]
pub struct RoleCache {
    inner: Cache<Uuid, String>,
}

impl RoleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, user_id: &Uuid) -> Option<String> {
        self.inner.get(user_id).await
    }

    pub async fn insert(&self, user_id: Uuid, role: String) {
        self.inner.insert(user_id, role).await;
    }

    /// Drop the cached claim for one user so the next check re-fetches it.
    pub async fn invalidate(&self, user_id: &Uuid) {
        debug!(user_id = %user_id, "Invalidating cached role claim");
        self.inner.invalidate(user_id).await;
    }

    /// Drop every cached claim.
    pub fn clear(&self) {
        debug!("Clearing role claim cache");
        self.inner.invalidate_all();
    }
}
