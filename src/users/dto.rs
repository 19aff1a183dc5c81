use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use uuid::Uuid;

use crate::users::repo::User;

/// Request body for user registration. Image payloads ride along as raw
/// bytes (base64 in the JSON wire form).
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub fullname: String,
    pub avatar: Option<ByteBuf>,
    pub avatar_content_type: Option<String>,
    pub cover_image: Option<ByteBuf>,
    pub cover_image_content_type: Option<String>,
}

/// Login accepts either identifier; password is always required.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

/// Refresh token may come in the body or in the `refresh_token` cookie.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateImageRequest {
    pub image: Option<ByteBuf>,
    pub content_type: Option<String>,
}

/// Sanitized user returned to clients: no hash, no refresh token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar_url: String,
    pub cover_image_url: Option<String>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            fullname: u.fullname,
            avatar_url: u.avatar_url,
            cover_image_url: u.cover_image_url,
        }
    }
}

/// Response returned after login or refresh.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn public_user_serialization_has_no_secret_fields() {
        let user = User {
            id: Uuid::new_v4(),
            username: "ana".into(),
            email: "a@x.com".into(),
            fullname: "Ana".into(),
            password_hash: "$argon2id$...".into(),
            avatar_url: "https://cdn.local/a.png".into(),
            cover_image_url: None,
            refresh_token: Some("tok".into()),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(json.contains("\"username\":\"ana\""));
        assert!(!json.contains("password"));
        assert!(!json.contains("refresh_token"));
        assert!(!json.contains("argon2"));
    }

    #[test]
    fn user_record_serialization_skips_hash_and_token() {
        let user = User {
            id: Uuid::new_v4(),
            username: "bo".into(),
            email: "b@x.com".into(),
            fullname: "Bo".into(),
            password_hash: "hash".into(),
            avatar_url: "u".into(),
            cover_image_url: None,
            refresh_token: Some("tok".into()),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("refresh_token"));
    }
}
