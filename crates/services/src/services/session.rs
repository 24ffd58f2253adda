//! Session lookup: who is the current caller.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::models::{auth_session::AuthSession, profile::Profile};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

const TOKEN_LENGTH: usize = 48;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("profile not found: {0}")]
    ProfileNotFound(Uuid),
    #[error("no profile with email {0}")]
    UnknownEmail(String),
    #[error("session ttl out of range")]
    InvalidTtl,
}

/// Authenticated user handle. The admin gate reads it but never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
}

/// Source of the current identity, if any.
#[async_trait]
pub trait SessionReader: Send + Sync {
    async fn current_identity(&self) -> Result<Option<Identity>, SessionError>;
}

/// Result of a sign-in. `token` is only ever returned here; the store keeps its hash.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

/// Issues, resolves and destroys bearer-token sessions
#[derive(Clone)]
pub struct AuthSessionService {
    pool: SqlitePool,
}

impl AuthSessionService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn sign_in(
        &self,
        profile_id: Uuid,
        ttl: Duration,
    ) -> Result<IssuedSession, SessionError> {
        let profile = Profile::find_by_id(&self.pool, profile_id)
            .await?
            .ok_or(SessionError::ProfileNotFound(profile_id))?;

        let ttl = chrono::Duration::from_std(ttl).map_err(|_| SessionError::InvalidTtl)?;
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .ok_or(SessionError::InvalidTtl)?;

        let token = generate_token();
        let session =
            AuthSession::create(&self.pool, profile.id, &hash_token(&token), expires_at).await?;

        info!(
            user_id = %profile.id,
            session_id = %session.id,
            expires_at = %session.expires_at,
            "Session issued"
        );

        Ok(IssuedSession {
            token,
            identity: Identity {
                user_id: profile.id,
                email: profile.email,
            },
            expires_at: session.expires_at,
        })
    }

    pub async fn sign_in_by_email(
        &self,
        email: &str,
        ttl: Duration,
    ) -> Result<IssuedSession, SessionError> {
        let profile = Profile::find_by_email(&self.pool, email)
            .await?
            .ok_or_else(|| SessionError::UnknownEmail(email.to_string()))?;
        self.sign_in(profile.id, ttl).await
    }

    /// Resolve a bearer token. Unknown and expired tokens resolve to `None`;
    /// expired sessions are removed on the way.
    pub async fn resolve(&self, token: &str) -> Result<Option<Identity>, SessionError> {
        let Some(session) = AuthSession::find_by_token_hash(&self.pool, &hash_token(token)).await?
        else {
            return Ok(None);
        };

        if session.is_expired(Utc::now()) {
            debug!(session_id = %session.id, "Session expired, removing");
            AuthSession::delete(&self.pool, session.id).await?;
            return Ok(None);
        }

        let identity = Profile::find_by_id(&self.pool, session.profile_id)
            .await?
            .map(|profile| Identity {
                user_id: profile.id,
                email: profile.email,
            });

        Ok(identity)
    }

    /// Returns whether a session was actually removed.
    pub async fn sign_out(&self, token: &str) -> Result<bool, SessionError> {
        let removed = AuthSession::delete_by_token_hash(&self.pool, &hash_token(token)).await?;
        if removed > 0 {
            info!("Session signed out");
        }
        Ok(removed > 0)
    }

    /// Session reader bound to one caller's bearer token.
    pub fn reader(&self, token: Option<String>) -> BearerSessionReader {
        BearerSessionReader {
            sessions: self.clone(),
            token,
        }
    }
}

pub struct BearerSessionReader {
    sessions: AuthSessionService,
    token: Option<String>,
}

#[async_trait]
impl SessionReader for BearerSessionReader {
    async fn current_identity(&self) -> Result<Option<Identity>, SessionError> {
        match self.token.as_deref() {
            Some(token) => self.sessions.resolve(token).await,
            None => Ok(None),
        }
    }
}

pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
