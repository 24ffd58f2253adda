use axum::{Router, routing::get};

use crate::AppState;

pub mod admin;
pub mod auth;
pub mod profile;

pub async fn health() -> &'static str {
    "ok"
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .merge(auth::router())
        .merge(profile::router())
        .merge(admin::router());

    Router::new().nest("/api", api).with_state(state)
}
