use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::media;
use crate::state::AppState;
use crate::users::dto::{
    ChangePasswordRequest, LoginRequest, PublicUser, RegisterRequest, SessionResponse,
    UpdateImageRequest, UpdateProfileRequest,
};
use crate::users::jwt::{JwtKeys, TokenKind};
use crate::users::password::{hash_password, verify_password};
use crate::users::repo::NewUser;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn required(value: &str, field: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn keys(st: &AppState) -> JwtKeys {
    JwtKeys::from_config(&st.config.jwt)
}

fn issue_pair(st: &AppState, user_id: Uuid) -> Result<(String, String), ApiError> {
    let keys = keys(st);
    let access = keys.sign_access(user_id)?;
    let refresh = keys.sign_refresh(user_id)?;
    Ok((access, refresh))
}

/// Creates a user with a hashed password and uploaded avatar. The avatar is
/// mandatory; the cover image is optional and its absence is not an error.
pub async fn register(st: &AppState, req: RegisterRequest) -> Result<PublicUser, ApiError> {
    let username = required(&req.username, "username")?.to_lowercase();
    let email = required(&req.email, "email")?;
    let fullname = required(&req.fullname, "fullname")?;
    required(&req.password, "password")?;
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("invalid email".into()));
    }

    if st.users.username_or_email_taken(&username, &email).await? {
        warn!(%username, "registration conflict");
        return Err(ApiError::Conflict(
            "user with this username or email already exists".into(),
        ));
    }

    let avatar = req
        .avatar
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ApiError::Validation("avatar file is required".into()))?;
    let avatar_ct = req
        .avatar_content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    let avatar_url = media::stage_and_upload(
        st.storage.as_ref(),
        Bytes::from(avatar.into_vec()),
        avatar_ct,
        "avatars",
    )
    .await?;

    let cover_image_url = match req.cover_image.filter(|b| !b.is_empty()) {
        Some(cover) => {
            let ct = req
                .cover_image_content_type
                .as_deref()
                .unwrap_or("application/octet-stream");
            Some(
                media::stage_and_upload(
                    st.storage.as_ref(),
                    Bytes::from(cover.into_vec()),
                    ct,
                    "covers",
                )
                .await?,
            )
        }
        None => None,
    };

    let password_hash = hash_password(&req.password)?;
    let user = st
        .users
        .create(NewUser {
            username,
            email,
            fullname,
            password_hash,
            avatar_url,
            cover_image_url,
        })
        .await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user.into())
}

/// Verifies credentials and opens a session: a fresh access+refresh pair is
/// issued and the stored refresh token is overwritten, which invalidates any
/// previously issued one (at most one live session per user).
pub async fn login(st: &AppState, req: LoginRequest) -> Result<SessionResponse, ApiError> {
    let identifier = req
        .username
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or(req
            .email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty()))
        .ok_or_else(|| ApiError::Validation("username or email is required".into()))?;

    let user = st
        .users
        .find_by_identifier(identifier)
        .await?
        .ok_or_else(|| ApiError::NotFound("user does not exist".into()))?;

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("invalid credentials".into()));
    }

    let (access_token, refresh_token) = issue_pair(st, user.id)?;
    st.users
        .set_refresh_token(user.id, Some(&refresh_token))
        .await?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(SessionResponse {
        access_token,
        refresh_token,
        user: user.into(),
    })
}

/// Rotates the session. The incoming token must verify as a refresh token
/// AND exactly equal the stored value; a stale token whose signature is
/// still valid is rejected. Of concurrent refreshes with the same stale
/// token, only the first writer wins.
pub async fn refresh_session(
    st: &AppState,
    incoming: Option<String>,
) -> Result<SessionResponse, ApiError> {
    let incoming = incoming
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::Unauthorized("missing refresh token".into()))?;

    let claims = keys(st).verify(&incoming, TokenKind::Refresh)?;

    let user = st
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid refresh token".into()))?;

    if user.refresh_token.as_deref() != Some(incoming.as_str()) {
        warn!(user_id = %user.id, "refresh token reuse detected");
        return Err(ApiError::Unauthorized(
            "refresh token is expired or already used".into(),
        ));
    }

    let (access_token, refresh_token) = issue_pair(st, user.id)?;
    let rotated = st
        .users
        .rotate_refresh_token(user.id, &incoming, &refresh_token)
        .await?;
    if !rotated {
        // Another request rotated first; this token is now stale.
        return Err(ApiError::Unauthorized(
            "refresh token is expired or already used".into(),
        ));
    }

    info!(user_id = %user.id, "session refreshed");
    Ok(SessionResponse {
        access_token,
        refresh_token,
        user: user.into(),
    })
}

/// Clears the stored refresh token. Idempotent: logging out twice is a no-op
/// the second time.
pub async fn logout(st: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    st.users.set_refresh_token(user_id, None).await?;
    info!(%user_id, "user logged out");
    Ok(())
}

pub async fn change_password(
    st: &AppState,
    user_id: Uuid,
    req: ChangePasswordRequest,
) -> Result<(), ApiError> {
    required(&req.new_password, "new password")?;

    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    if !verify_password(&req.old_password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("old password is incorrect".into()));
    }

    let hash = hash_password(&req.new_password)?;
    st.users.set_password_hash(user_id, &hash).await?;
    info!(%user_id, "password changed");
    Ok(())
}

pub async fn current_user(st: &AppState, user_id: Uuid) -> Result<PublicUser, ApiError> {
    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(user.into())
}

/// Partial update of mutable profile fields. Password and token columns are
/// never touched by this path.
pub async fn update_profile(
    st: &AppState,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> Result<PublicUser, ApiError> {
    let fullname = req
        .fullname
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    if fullname.is_none() && email.is_none() {
        return Err(ApiError::Validation(
            "at least one of fullname or email is required".into(),
        ));
    }
    if let Some(ref email) = email {
        if !is_valid_email(email) {
            return Err(ApiError::Validation("invalid email".into()));
        }
    }

    let user = st
        .users
        .update_profile(user_id, fullname.as_deref(), email.as_deref())
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(user.into())
}

pub async fn update_avatar(
    st: &AppState,
    user_id: Uuid,
    req: UpdateImageRequest,
) -> Result<PublicUser, ApiError> {
    let url = upload_image(st, req, "avatars").await?;
    let user = st
        .users
        .set_avatar_url(user_id, &url)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    info!(%user_id, "avatar updated");
    Ok(user.into())
}

pub async fn update_cover_image(
    st: &AppState,
    user_id: Uuid,
    req: UpdateImageRequest,
) -> Result<PublicUser, ApiError> {
    let url = upload_image(st, req, "covers").await?;
    let user = st
        .users
        .set_cover_image_url(user_id, &url)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    info!(%user_id, "cover image updated");
    Ok(user.into())
}

// The superseded blob is intentionally not deleted; stored URLs only move
// forward.
async fn upload_image(
    st: &AppState,
    req: UpdateImageRequest,
    prefix: &str,
) -> Result<String, ApiError> {
    let image = req
        .image
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ApiError::Validation("image file is required".into()))?;
    let ct = req
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    media::stage_and_upload(st.storage.as_ref(), Bytes::from(image.into_vec()), ct, prefix).await
}
