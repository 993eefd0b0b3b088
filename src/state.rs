use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::auth::memory::{MemoryRefreshTokenStore, MemoryResetTokenStore, MemoryUserStore};
use crate::auth::repo::{
    PgRefreshTokenStore, PgResetTokenStore, PgUserStore, RefreshTokenStore, ResetTokenStore,
    UserStore,
};
use crate::config::{AppConfig, StoreBackend};
use crate::mail::{mailer_from_config, Mailer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub reset_tokens: Arc<dyn ResetTokenStore>,
    pub mailer: Arc<dyn Mailer>,
    /// Present only with the Postgres backend; used for migrations.
    pub db: Option<PgPool>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let mailer = mailer_from_config(&config.mail);
        match config.store.clone() {
            StoreBackend::Postgres { database_url } => {
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(&database_url)
                    .await
                    .context("connect to database")?;
                Ok(Self::postgres(config, db, mailer))
            }
            StoreBackend::Memory => Ok(Self::in_memory(config, mailer)),
        }
    }

    pub fn postgres(config: AppConfig, db: PgPool, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            config: Arc::new(config),
            users: Arc::new(PgUserStore::new(db.clone())),
            refresh_tokens: Arc::new(PgRefreshTokenStore::new(db.clone())),
            reset_tokens: Arc::new(PgResetTokenStore::new(db.clone())),
            mailer,
            db: Some(db),
        }
    }

    pub fn in_memory(config: AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self::from_parts(
            config,
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryRefreshTokenStore::new()),
            Arc::new(MemoryResetTokenStore::new()),
            mailer,
        )
    }

    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        reset_tokens: Arc<dyn ResetTokenStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            users,
            refresh_tokens,
            reset_tokens,
            mailer,
            db: None,
        }
    }
}
