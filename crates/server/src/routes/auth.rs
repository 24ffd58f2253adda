use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use services::services::session::Identity;
use tracing::info;
use utils::response::ApiResponse;

use crate::{AppState, auth::AuthenticatedUser, error::ApiError};

/// GET /api/auth/session
/// Identity behind the bearer token, or `null` when there is no live session
pub async fn get_session(
    user: Option<AuthenticatedUser>,
) -> ResponseJson<ApiResponse<Option<Identity>>> {
    ResponseJson(ApiResponse::success(user.map(|user| user.identity)))
}

/// POST /api/auth/sign-out
pub async fn sign_out(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.sessions.sign_out(&user.token).await?;
    state.role_cache.invalidate(&user.identity.user_id).await;
    info!(user_id = %user.identity.user_id, "Signed out");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/auth",
        Router::new()
            .route("/session", get(get_session))
            .route("/sign-out", post(sign_out)),
    )
}
