use serde::Serialize;
use uuid::Uuid;

/// Channel page projection: public user fields plus subscription aggregates,
/// computed relative to the viewing user. No credential fields.
#[derive(Debug, Serialize)]
pub struct ChannelProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar_url: String,
    pub cover_image_url: Option<String>,
    pub subscribers_count: i64,
    pub subscribed_to_count: i64,
    pub is_subscribed: bool,
}
