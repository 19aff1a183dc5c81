use axum::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Subscription aggregates for one channel, computed relative to a viewer.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelStats {
    pub subscribers_count: i64,
    pub subscribed_to_count: i64,
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoOwner {
    pub fullname: String,
    pub username: String,
    pub avatar_url: String,
}

/// One watch-history entry: the video joined with its owner's public fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchedVideo {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub video_file_url: String,
    pub duration: i32,
    pub views: i64,
    pub owner: VideoOwner,
}

/// Read-side store for the two aggregation views. Like the credential store,
/// constructed once and handed to the service.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn channel_stats(&self, channel_id: Uuid, viewer_id: Uuid)
        -> anyhow::Result<ChannelStats>;
    /// Watch history in stored append order; never re-sorted here.
    async fn watch_history(&self, user_id: Uuid) -> anyhow::Result<Vec<WatchedVideo>>;
}

#[derive(Clone)]
pub struct PgProfileStore {
    db: PgPool,
}

impl PgProfileStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(FromRow)]
struct WatchedVideoRow {
    id: Uuid,
    title: String,
    description: String,
    thumbnail_url: String,
    video_file_url: String,
    duration: i32,
    views: i64,
    owner_fullname: String,
    owner_username: String,
    owner_avatar_url: String,
}

impl From<WatchedVideoRow> for WatchedVideo {
    fn from(r: WatchedVideoRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            thumbnail_url: r.thumbnail_url,
            video_file_url: r.video_file_url,
            duration: r.duration,
            views: r.views,
            owner: VideoOwner {
                fullname: r.owner_fullname,
                username: r.owner_username,
                avatar_url: r.owner_avatar_url,
            },
        }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn channel_stats(
        &self,
        channel_id: Uuid,
        viewer_id: Uuid,
    ) -> anyhow::Result<ChannelStats> {
        // Three explicit queries: two counts and a membership check.
        let (subscribers_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE channel_id = $1")
                .bind(channel_id)
                .fetch_one(&self.db)
                .await?;

        let (subscribed_to_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = $1")
                .bind(channel_id)
                .fetch_one(&self.db)
                .await?;

        let (is_subscribed,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE channel_id = $1 AND subscriber_id = $2)",
        )
        .bind(channel_id)
        .bind(viewer_id)
        .fetch_one(&self.db)
        .await?;

        Ok(ChannelStats {
            subscribers_count,
            subscribed_to_count,
            is_subscribed,
        })
    }

    async fn watch_history(&self, user_id: Uuid) -> anyhow::Result<Vec<WatchedVideo>> {
        let rows = sqlx::query_as::<_, WatchedVideoRow>(
            r#"
            SELECT v.id, v.title, v.description, v.thumbnail_url, v.video_file_url,
                   v.duration, v.views,
                   u.fullname AS owner_fullname,
                   u.username AS owner_username,
                   u.avatar_url AS owner_avatar_url
            FROM watch_history wh
            JOIN videos v ON v.id = wh.video_id
            JOIN users u ON u.id = v.owner_id
            WHERE wh.user_id = $1
            ORDER BY wh.position
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(WatchedVideo::from).collect())
    }
}
