//! Server-side admin validation: an independent verdict that never trusts the client cache.

use std::time::Duration;

use async_trait::async_trait;
use db::models::profile::Profile;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;
use ts_rs::TS;
use url::Url;

use super::session::Identity;

#[derive(Debug, Error)]
pub enum AdminValidationError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("validation request was not authenticated")]
    Unauthorized,
    #[error("json error: {0}")]
    Serde(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Wire contract of the validation endpoint: `{ "isAdmin": bool }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AdminVerdict {
    pub is_admin: bool,
}

#[async_trait]
pub trait AdminValidator: Send + Sync {
    async fn validate(&self, identity: &Identity) -> Result<AdminVerdict, AdminValidationError>;
}

/// Re-derives admin status from the stored profile row. Backs the validation endpoint.
#[derive(Clone)]
pub struct StoredRoleValidator {
    pool: SqlitePool,
}

impl StoredRoleValidator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminValidator for StoredRoleValidator {
    async fn validate(&self, identity: &Identity) -> Result<AdminVerdict, AdminValidationError> {
        // A missing profile is an explicit "no", not an outage.
        let is_admin = Profile::find_by_id(&self.pool, identity.user_id)
            .await?
            .is_some_and(|profile| profile.is_admin());
        debug!(user_id = %identity.user_id, is_admin, "Stored role validation");
        Ok(AdminVerdict { is_admin })
    }
}

/// Calls the validation endpoint over HTTP with the caller's bearer token.
/// Single attempt, no retries.
#[derive(Debug, Clone)]
pub struct HttpAdminValidator {
    http: Client,
    endpoint: Url,
    access_token: String,
}

impl HttpAdminValidator {
    pub fn new(
        endpoint: Url,
        access_token: String,
        timeout: Duration,
    ) -> Result<Self, AdminValidationError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("solar-admin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AdminValidationError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            access_token,
        })
    }
}

#[async_trait]
impl AdminValidator for HttpAdminValidator {
    async fn validate(&self, identity: &Identity) -> Result<AdminVerdict, AdminValidationError> {
        debug!(user_id = %identity.user_id, endpoint = %self.endpoint, "Requesting admin verdict");

        let res = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<AdminVerdict>()
                .await
                .map_err(|e| AdminValidationError::Serde(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(AdminValidationError::Unauthorized),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(AdminValidationError::Http { status, body })
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> AdminValidationError {
    if e.is_timeout() {
        AdminValidationError::Timeout
    } else {
        AdminValidationError::Transport(e.to_string())
    }
}
