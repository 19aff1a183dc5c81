use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::profiles::dto::ChannelProfile;
use crate::profiles::repo::WatchedVideo;
use crate::state::AppState;

/// Resolves a channel by normalized username and decorates it with
/// subscription aggregates relative to the viewer.
pub async fn channel_profile(
    st: &AppState,
    viewer_id: Uuid,
    username: &str,
) -> Result<ChannelProfile, ApiError> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(ApiError::Validation("username is required".into()));
    }

    let channel = st
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| ApiError::NotFound("channel does not exist".into()))?;

    let stats = st.profiles.channel_stats(channel.id, viewer_id).await?;
    debug!(channel = %channel.username, subscribers = stats.subscribers_count, "channel profile built");

    Ok(ChannelProfile {
        id: channel.id,
        username: channel.username,
        email: channel.email,
        fullname: channel.fullname,
        avatar_url: channel.avatar_url,
        cover_image_url: channel.cover_image_url,
        subscribers_count: stats.subscribers_count,
        subscribed_to_count: stats.subscribed_to_count,
        is_subscribed: stats.is_subscribed,
    })
}

/// The caller's watch history, each entry joined with its owner's public
/// fields, in the order entries were appended.
pub async fn watch_history(st: &AppState, viewer_id: Uuid) -> Result<Vec<WatchedVideo>, ApiError> {
    Ok(st.profiles.watch_history(viewer_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_state, watched_video};
    use crate::users::repo::NewUser;

    async fn seed_user(
        users: &crate::testing::MemUserStore,
        username: &str,
    ) -> crate::users::repo::User {
        use crate::users::repo::UserStore;
        users
            .create(NewUser {
                username: username.into(),
                email: format!("{username}@x.com"),
                fullname: username.to_uppercase(),
                password_hash: "$argon2id$fake".into(),
                avatar_url: format!("https://cdn.fake.local/avatars/{username}.png"),
                cover_image_url: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn channel_profile_counts_and_membership() {
        let (st, users, profiles, _) = fake_state();
        let ana = seed_user(&users, "ana").await;
        let bob = seed_user(&users, "bob").await;
        let eve = seed_user(&users, "eve").await;

        // bob and eve subscribe to ana; ana subscribes to bob.
        profiles.subscribe(bob.id, ana.id);
        profiles.subscribe(eve.id, ana.id);
        profiles.subscribe(ana.id, bob.id);

        let profile = channel_profile(&st, bob.id, "Ana ").await.unwrap();
        assert_eq!(profile.username, "ana");
        assert_eq!(profile.subscribers_count, 2);
        assert_eq!(profile.subscribed_to_count, 1);
        assert!(profile.is_subscribed);

        let as_stranger = channel_profile(&st, Uuid::new_v4(), "ana").await.unwrap();
        assert!(!as_stranger.is_subscribed);
    }

    #[tokio::test]
    async fn channel_profile_response_has_no_secret_fields() {
        let (st, users, _, _) = fake_state();
        let ana = seed_user(&users, "ana").await;
        let profile = channel_profile(&st, ana.id, "ana").await.unwrap();
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("refresh_token"));
    }

    #[tokio::test]
    async fn unknown_channel_is_not_found() {
        let (st, _, _, _) = fake_state();
        let err = channel_profile(&st, Uuid::new_v4(), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = channel_profile(&st, Uuid::new_v4(), "  ").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn watch_history_preserves_append_order() {
        let (st, users, profiles, _) = fake_state();
        let ana = seed_user(&users, "ana").await;

        profiles.push_history(ana.id, watched_video("first", "bob"));
        profiles.push_history(ana.id, watched_video("second", "eve"));
        profiles.push_history(ana.id, watched_video("third", "bob"));

        let history = watch_history(&st, ana.id).await.unwrap();
        let titles: Vec<_> = history.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
        assert_eq!(history[0].owner.username, "bob");
        assert_eq!(history[1].owner.username, "eve");
    }

    #[tokio::test]
    async fn empty_watch_history_is_an_empty_list() {
        let (st, users, _, _) = fake_state();
        let ana = seed_user(&users, "ana").await;
        assert!(watch_history(&st, ana.id).await.unwrap().is_empty());
    }
}
