//! Request extractors for the caller's session and admin status.

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use services::services::{
    admin_validation::{AdminValidator, StoredRoleValidator},
    session::Identity,
};
use tracing::debug;

use crate::{AppState, error::ApiError};

/// Caller with a live session. Use `Option<AuthenticatedUser>` where signing in is optional.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: Identity,
    pub token: String,
}

/// Caller whose stored profile role is admin right now.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

pub fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

impl OptionalFromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(None);
        };

        let identity = state.sessions.resolve(&token).await?;
        if identity.is_none() {
            debug!("Bearer token does not match a live session");
        }
        Ok(identity.map(|identity| AuthenticatedUser { identity, token }))
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        <Self as OptionalFromRequestParts<AppState>>::from_request_parts(parts, state)
            .await?
            .ok_or(ApiError::Unauthorized)
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user =
            <AuthenticatedUser as FromRequestParts<AppState>>::from_request_parts(parts, state)
                .await?;

        let verdict = StoredRoleValidator::new(state.db.pool.clone())
            .validate(&user.identity)
            .await?;
        if !verdict.is_admin {
            debug!(user_id = %user.identity.user_id, "Admin route refused");
            return Err(ApiError::Forbidden);
        }

        Ok(AdminUser(user))
    }
}
