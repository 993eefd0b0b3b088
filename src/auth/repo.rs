use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    dto::PublicUser,
    password::{hash_password, PasswordHashError},
    repo_types::{NewUser, PasswordResetRecord, ProfileUpdate, RefreshTokenRecord, User},
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Hashing(#[from] PasswordHashError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Credential store. Implementations hash plaintext passwords themselves,
/// so callers never hold a hash and the plaintext never persists.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Profile without the credential column.
    async fn find_profile(&self, id: Uuid) -> Result<Option<PublicUser>, StoreError>;
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;
    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, StoreError>;
    async fn set_password(&self, id: Uuid, plain: &str) -> Result<bool, StoreError>;
}

/// Refresh token ledger.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<RefreshTokenRecord, StoreError>;
    async fn find_active(
        &self,
        user_id: Uuid,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;
    /// Overwrites hash and lifetime of an existing record, keeping its id.
    async fn rotate(
        &self,
        id: Uuid,
        token_hash: &str,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError>;
    async fn delete_by_hash(&self, token_hash: &str) -> Result<bool, StoreError>;
    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, StoreError>;
    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError>;
}

/// Password reset ledger.
#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<PasswordResetRecord, StoreError>;
    async fn find_active(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<PasswordResetRecord>, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, StoreError>;
    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError>;
}

fn map_unique(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::DuplicateEmail,
        other => StoreError::Database(other),
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, photo, phone, bio, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, photo, phone, bio, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<PublicUser>, StoreError> {
        let profile = sqlx::query_as::<_, PublicUser>(
            r#"SELECT id, name, email, photo, phone, bio FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(profile)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let password_hash = hash_password(&new_user.password)?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, photo, phone, bio, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_unique)?;
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   photo = COALESCE($3, photo),
                   phone = COALESCE($4, phone),
                   bio = COALESCE($5, bio),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, name, email, password_hash, photo, phone, bio, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(update.name)
        .bind(update.photo)
        .bind(update.phone)
        .bind(update.bio)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_password(&self, id: Uuid, plain: &str) -> Result<bool, StoreError> {
        let password_hash = hash_password(plain)?;
        let res = sqlx::query(
            r#"UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1"#,
        )
        .bind(id)
        .bind(&password_hash)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[derive(Clone)]
pub struct PgRefreshTokenStore {
    db: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, token_hash, created_at, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token_hash)
        .bind(created_at)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await?;
        Ok(record)
    }

    async fn find_active(
        &self,
        user_id: Uuid,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            SELECT id, user_id, token_hash, created_at, expires_at
              FROM refresh_tokens
             WHERE user_id = $1 AND token_hash = $2 AND expires_at > $3
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(record)
    }

    async fn rotate(
        &self,
        id: Uuid,
        token_hash: &str,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE refresh_tokens
               SET token_hash = $2, created_at = $3, expires_at = $4
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(created_at)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_by_hash(&self, token_hash: &str) -> Result<bool, StoreError> {
        let res = sqlx::query(r#"DELETE FROM refresh_tokens WHERE token_hash = $1"#)
            .bind(token_hash)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let res = sqlx::query(r#"DELETE FROM refresh_tokens WHERE user_id = $1"#)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let res = sqlx::query(r#"DELETE FROM refresh_tokens WHERE expires_at <= $1"#)
            .bind(now)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }
}

#[derive(Clone)]
pub struct PgResetTokenStore {
    db: PgPool,
}

impl PgResetTokenStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ResetTokenStore for PgResetTokenStore {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<PasswordResetRecord, StoreError> {
        let record = sqlx::query_as::<_, PasswordResetRecord>(
            r#"
            INSERT INTO password_reset_tokens (id, user_id, token_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, token_hash, created_at, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token_hash)
        .bind(created_at)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await?;
        Ok(record)
    }

    async fn find_active(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<PasswordResetRecord>, StoreError> {
        let record = sqlx::query_as::<_, PasswordResetRecord>(
            r#"
            SELECT id, user_id, token_hash, created_at, expires_at
              FROM password_reset_tokens
             WHERE token_hash = $1 AND expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(record)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query(r#"DELETE FROM password_reset_tokens WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let res = sqlx::query(r#"DELETE FROM password_reset_tokens WHERE user_id = $1"#)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let res = sqlx::query(r#"DELETE FROM password_reset_tokens WHERE expires_at <= $1"#)
            .bind(now)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }
}
