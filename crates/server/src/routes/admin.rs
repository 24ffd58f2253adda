//! Admin endpoints. Everything except `/validate` requires a stored admin role.

use std::str::FromStr;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{delete, get, post, put},
};
use db::models::{
    profile::{Profile, ProfileRole},
    security_event::SecurityEvent,
};
use serde::{Deserialize, Serialize};
use services::services::admin_validation::{AdminValidator, AdminVerdict, StoredRoleValidator};
use tracing::info;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AdminUser, AuthenticatedUser},
    error::ApiError,
};

const DEFAULT_EVENT_LIMIT: i64 = 50;
const MAX_EVENT_LIMIT: i64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct SecurityEventsQuery {
    pub limit: Option<i64>,
    pub profile_id: Option<Uuid>,
}

/// POST /api/admin/validate
/// Bare `{ "isAdmin": bool }` verdict from the stored profile, never from any cache
pub async fn validate(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<ResponseJson<AdminVerdict>, ApiError> {
    let verdict = StoredRoleValidator::new(state.db.pool.clone())
        .validate(&user.identity)
        .await?;
    Ok(ResponseJson(verdict))
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<ResponseJson<ApiResponse<Vec<Profile>>>, ApiError> {
    let profiles = Profile::find_all(&state.db.pool).await?;
    Ok(ResponseJson(ApiResponse::success(profiles)))
}

/// PUT /api/admin/users/{id}/role
/// Existing sessions stay valid; the new role takes effect on the next validation.
pub async fn update_user_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(profile_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateRoleRequest>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let role = ProfileRole::from_str(&payload.role)
        .map_err(|_| ApiError::BadRequest(format!("unknown role '{}'", payload.role)))?;

    let profile = Profile::update_role(&state.db.pool, profile_id, role)
        .await?
        .ok_or_else(|| ApiError::NotFound("profile not found".to_string()))?;

    info!(
        admin_id = %admin.identity.user_id,
        profile_id = %profile_id,
        role = %role,
        "Profile role changed"
    );

    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// DELETE /api/admin/users/{id}
/// Sessions go with the profile; its security events are kept with no profile.
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(profile_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if profile_id == admin.identity.user_id {
        return Err(ApiError::BadRequest(
            "admins cannot delete their own profile".to_string(),
        ));
    }

    if Profile::delete(&state.db.pool, profile_id).await? == 0 {
        return Err(ApiError::NotFound("profile not found".to_string()));
    }
    state.role_cache.invalidate(&profile_id).await;

    info!(admin_id = %admin.identity.user_id, profile_id = %profile_id, "Profile deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

/// GET /api/admin/security-events?limit=N&profile_id=ID
pub async fn list_security_events(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<SecurityEventsQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<SecurityEvent>>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .clamp(1, MAX_EVENT_LIMIT);
    let events = match query.profile_id {
        Some(profile_id) => {
            SecurityEvent::find_by_profile_id(&state.db.pool, profile_id, limit).await?
        }
        None => SecurityEvent::find_recent(&state.db.pool, limit).await?,
    };
    Ok(ResponseJson(ApiResponse::success(events)))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/admin",
        Router::new()
            .route("/validate", post(validate))
            .route("/users", get(list_users))
            .route("/users/{id}", delete(delete_user))
            .route("/users/{id}/role", put(update_user_role))
            .route("/security-events", get(list_security_events)),
    )
}
