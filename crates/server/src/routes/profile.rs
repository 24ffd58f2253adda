use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use db::models::profile::{Profile, ProfileRole};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, auth::AuthenticatedUser, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RoleResponse {
    pub role: ProfileRole,
}

/// GET /api/profile/role
/// The caller's stored role claim
pub async fn get_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<ResponseJson<ApiResponse<RoleResponse>>, ApiError> {
    let profile = Profile::find_by_id(&state.db.pool, user.identity.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("profile not found".to_string()))?;

    Ok(ResponseJson(ApiResponse::success(RoleResponse {
        role: profile.role,
    })))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/profile/role", get(get_role))
}
