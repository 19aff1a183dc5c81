use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;
use crate::users::{
    cookies,
    dto::{
        ChangePasswordRequest, LoginRequest, PublicUser, RefreshRequest, RegisterRequest,
        SessionResponse, UpdateImageRequest, UpdateProfileRequest,
    },
    jwt::{AuthUser, JwtKeys},
    services,
};

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/refresh-token", post(refresh))
        .route("/users/logout", post(logout))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/users/current-user", get(current_user))
        .route("/users/change-password", post(change_password))
        .route("/users/update-account", patch(update_account))
        .route("/users/avatar", patch(update_avatar))
        .route("/users/cover-image", patch(update_cover_image))
}

/// Set-Cookie headers mirroring the token pair in the response body.
fn session_headers(st: &AppState, session: &SessionResponse) -> HeaderMap {
    let keys = JwtKeys::from_config(&st.config.jwt);
    let secure = st.config.secure_cookies;
    let mut headers = HeaderMap::new();
    cookies::append_set_cookie(
        &mut headers,
        &cookies::session_cookie(
            cookies::ACCESS_COOKIE,
            &session.access_token,
            keys.access_ttl_seconds(),
            secure,
        ),
    );
    cookies::append_set_cookie(
        &mut headers,
        &cookies::session_cookie(
            cookies::REFRESH_COOKIE,
            &session.refresh_token,
            keys.refresh_ttl_seconds(),
            secure,
        ),
    );
    headers
}

fn cleared_session_headers(st: &AppState) -> HeaderMap {
    let secure = st.config.secure_cookies;
    let mut headers = HeaderMap::new();
    cookies::append_set_cookie(&mut headers, &cookies::clear_cookie(cookies::ACCESS_COOKIE, secure));
    cookies::append_set_cookie(&mut headers, &cookies::clear_cookie(cookies::REFRESH_COOKIE, secure));
    headers
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    let user = services::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<SessionResponse>), ApiError> {
    let session = services::login(&state, payload).await?;
    let headers = session_headers(&state, &session);
    Ok((headers, Json(session)))
}

#[instrument(skip(state, headers, payload))]
async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<RefreshRequest>>,
) -> Result<(HeaderMap, Json<SessionResponse>), ApiError> {
    let incoming = payload
        .and_then(|Json(p)| p.refresh_token)
        .or_else(|| cookies::cookie_value(&headers, cookies::REFRESH_COOKIE));
    let session = services::refresh_session(&state, incoming).await?;
    let headers = session_headers(&state, &session);
    Ok((headers, Json(session)))
}

#[instrument(skip(state))]
async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<(HeaderMap, Json<serde_json::Value>), ApiError> {
    services::logout(&state, user_id).await?;
    Ok((
        cleared_session_headers(&state),
        Json(json!({ "message": "logged out" })),
    ))
}

#[instrument(skip(state))]
async fn current_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    Ok(Json(services::current_user(&state, user_id).await?))
}

#[instrument(skip(state, payload))]
async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    services::change_password(&state, user_id, payload).await?;
    Ok(Json(json!({ "message": "password changed" })))
}

#[instrument(skip(state, payload))]
async fn update_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    Ok(Json(services::update_profile(&state, user_id, payload).await?))
}

#[instrument(skip(state, payload))]
async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateImageRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    Ok(Json(services::update_avatar(&state, user_id, payload).await?))
}

#[instrument(skip(state, payload))]
async fn update_cover_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateImageRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    Ok(Json(
        services::update_cover_image(&state, user_id, payload).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_state;
    use axum::http::header::SET_COOKIE;
    use uuid::Uuid;

    #[tokio::test]
    async fn session_headers_set_both_cookies() {
        let (st, _, _, _) = fake_state();
        let session = SessionResponse {
            access_token: "acc".into(),
            refresh_token: "ref".into(),
            user: PublicUser {
                id: Uuid::new_v4(),
                username: "ana".into(),
                email: "a@x.com".into(),
                fullname: "Ana".into(),
                avatar_url: "u".into(),
                cover_image_url: None,
            },
        };
        let headers = session_headers(&st, &session);
        let cookies: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("access_token=acc"));
        assert!(cookies[1].starts_with("refresh_token=ref"));
        assert!(cookies.iter().all(|c| c.contains("HttpOnly")));
    }

    #[tokio::test]
    async fn cleared_session_headers_expire_both_cookies() {
        let (st, _, _, _) = fake_state();
        let headers = cleared_session_headers(&st);
        let cookies: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    }
}
