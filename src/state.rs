use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::profiles::repo::{PgProfileStore, ProfileStore};
use crate::storage::{BlobStore, S3Storage};
use crate::users::repo::{PgUserStore, UserStore};

/// Shared handles for one running service. Stores are constructed here once
/// and passed in; no module-level clients anywhere.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub storage: Arc<dyn BlobStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let storage =
            Arc::new(S3Storage::new(&config.storage).await?) as Arc<dyn BlobStore>;
        let users = Arc::new(PgUserStore::new(db.clone())) as Arc<dyn UserStore>;
        let profiles = Arc::new(PgProfileStore::new(db.clone())) as Arc<dyn ProfileStore>;

        Ok(Self {
            db,
            config,
            users,
            profiles,
            storage,
        })
    }

    pub fn from_parts(
        db: PgPool,
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        profiles: Arc<dyn ProfileStore>,
        storage: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            db,
            config,
            users,
            profiles,
            storage,
        }
    }
}
