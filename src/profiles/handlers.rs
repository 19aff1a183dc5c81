use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::error::ApiError;
use crate::profiles::{dto::ChannelProfile, repo::WatchedVideo, services};
use crate::state::AppState;
use crate::users::jwt::AuthUser;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users/c/:username", get(channel_profile))
        .route("/users/history", get(watch_history))
}

#[instrument(skip(state))]
async fn channel_profile(
    State(state): State<AppState>,
    AuthUser(viewer_id): AuthUser,
    Path(username): Path<String>,
) -> Result<Json<ChannelProfile>, ApiError> {
    Ok(Json(
        services::channel_profile(&state, viewer_id, &username).await?,
    ))
}

#[instrument(skip(state))]
async fn watch_history(
    State(state): State<AppState>,
    AuthUser(viewer_id): AuthUser,
) -> Result<Json<Vec<WatchedVideo>>, ApiError> {
    Ok(Json(services::watch_history(&state, viewer_id).await?))
}
