use std::sync::Arc;

use axum::Router;
use db::DBService;
use services::services::{
    admin_guard::{AdminGuardDeps, Navigator},
    admin_validation::AdminValidationError,
    config::Config,
    role_cache::RoleCache,
    session::{AuthSessionService, IssuedSession, SessionError},
};

pub mod auth;
pub mod error;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
    pub config: Arc<Config>,
    pub sessions: AuthSessionService,
    pub role_cache: RoleCache,
}

impl AppState {
    pub fn new(db: DBService, config: Config) -> Self {
        let sessions = AuthSessionService::new(db.pool.clone());
        let role_cache = RoleCache::new(config.role_cache_ttl);
        Self {
            db,
            config: Arc::new(config),
            sessions,
            role_cache,
        }
    }

    /// Issue a session for the profile with `email`, valid for the configured session TTL.
    pub async fn issue_session(&self, email: &str) -> Result<IssuedSession, SessionError> {
        self.sessions
            .sign_in_by_email(email, self.config.session_ttl)
            .await
    }

    /// Guard wiring for one caller, sharing this process's role cache.
    pub fn guard_deps(
        &self,
        access_token: Option<String>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<AdminGuardDeps, AdminValidationError> {
        AdminGuardDeps::connected(
            &self.db,
            &self.config,
            self.role_cache.clone(),
            access_token,
            navigator,
        )
    }
}

pub fn router(state: AppState) -> Router {
    routes::router(state)
}
