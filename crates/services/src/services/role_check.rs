//! Client-side role check: is the current identity an admin according to its role claim?

use std::sync::Arc;

use async_trait::async_trait;
use db::models::profile::Profile;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{role_cache::RoleCache, session::Identity};

/// The only role that opens the admin area. Compared by exact string equality.
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Error)]
pub enum RoleFetchError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("no profile for user {0}")]
    ProfileNotFound(Uuid),
    #[error("role lookup failed: {0}")]
    Unavailable(String),
}

/// Where role claims come from when they are not cached.
#[async_trait]
pub trait RoleSource: Send + Sync {
    async fn fetch_role(&self, identity: &Identity) -> Result<String, RoleFetchError>;
}

/// Reads the role stored on the identity's profile row.
pub struct ProfileRoleSource {
    pool: SqlitePool,
}

impl ProfileRoleSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleSource for ProfileRoleSource {
    async fn fetch_role(&self, identity: &Identity) -> Result<String, RoleFetchError> {
        let profile = Profile::find_by_id(&self.pool, identity.user_id)
            .await?
            .ok_or(RoleFetchError::ProfileNotFound(identity.user_id))?;
        Ok(profile.role.to_string())
    }
}

/// Tri-state outcome of the role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCheck {
    /// No identity yet.
    Unknown,
    Admin,
    NotAdmin,
}

impl AdminCheck {
    pub fn from_role(role: &str) -> Self {
        if role == ADMIN_ROLE {
            AdminCheck::Admin
        } else {
            AdminCheck::NotAdmin
        }
    }
}

#[derive(Clone)]
pub struct RoleChecker {
    source: Arc<dyn RoleSource>,
    cache: RoleCache,
}

impl RoleChecker {
    pub fn new(source: Arc<dyn RoleSource>, cache: RoleCache) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &RoleCache {
        &self.cache
    }

    /// Cached claim first, then the source. A failed lookup is `NotAdmin`, never `Unknown`.
    pub async fn check(&self, identity: Option<&Identity>) -> AdminCheck {
        let Some(identity) = identity else {
            return AdminCheck::Unknown;
        };

        if let Some(role) = self.cache.get(&identity.user_id).await {
            debug!(user_id = %identity.user_id, role = %role, "Role claim served from cache");
            return AdminCheck::from_role(&role);
        }

        match self.source.fetch_role(identity).await {
            Ok(role) => {
                let check = AdminCheck::from_role(&role);
                self.cache.insert(identity.user_id, role).await;
                check
            }
            Err(e) => {
                warn!(
                    user_id = %identity.user_id,
                    error = %e,
                    "Role claim lookup failed, treating as non-admin"
                );
                AdminCheck::NotAdmin
            }
        }
    }
}
