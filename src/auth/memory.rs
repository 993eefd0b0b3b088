//! In-memory stores for `STORE_BACKEND=memory` and the test-suite.
use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    dto::PublicUser,
    password::hash_password,
    repo::{RefreshTokenStore, ResetTokenStore, StoreError, UserStore},
    repo_types::{
        NewUser, PasswordResetRecord, ProfileUpdate, RefreshTokenRecord, User, DEFAULT_BIO,
        DEFAULT_PHONE, DEFAULT_PHOTO,
    },
};

#[derive(Default)]
struct Users {
    by_id: HashMap<Uuid, User>,
    // unique index on email
    id_by_email: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct MemoryUserStore {
    inner: RwLock<Users>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.inner.read().await;
        Ok(users
            .id_by_email
            .get(email)
            .and_then(|id| users.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.by_id.get(&id).cloned())
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<PublicUser>, StoreError> {
        Ok(self.inner.read().await.by_id.get(&id).map(User::to_public))
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let password_hash = hash_password(&new_user.password)?;
        let mut users = self.inner.write().await;
        if users.id_by_email.contains_key(&new_user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash,
            photo: DEFAULT_PHOTO.into(),
            phone: DEFAULT_PHONE.into(),
            bio: DEFAULT_BIO.into(),
            created_at: now,
            updated_at: now,
        };
        users.id_by_email.insert(user.email.clone(), user.id);
        users.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.inner.write().await;
        let Some(user) = users.by_id.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(photo) = update.photo {
            user.photo = photo;
        }
        if let Some(phone) = update.phone {
            user.phone = phone;
        }
        if let Some(bio) = update.bio {
            user.bio = bio;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn set_password(&self, id: Uuid, plain: &str) -> Result<bool, StoreError> {
        let password_hash = hash_password(plain)?;
        let mut users = self.inner.write().await;
        match users.by_id.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash;
                user.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    records: RwLock<HashMap<Uuid, RefreshTokenRecord>>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token_hash.to_string(),
            created_at,
            expires_at,
        };
        self.records.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_active(
        &self,
        user_id: Uuid,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.user_id == user_id && r.token_hash == token_hash && r.expires_at > now)
            .cloned())
    }

    async fn rotate(
        &self,
        id: Uuid,
        token_hash: &str,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(r) => {
                r.token_hash = token_hash.to_string();
                r.created_at = created_at;
                r.expires_at = expires_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_hash(&self, token_hash: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.token_hash != token_hash);
        Ok(records.len() < before)
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.user_id != user_id);
        Ok((before - records.len()) as u64)
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.expires_at > now);
        Ok((before - records.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryResetTokenStore {
    records: RwLock<HashMap<Uuid, PasswordResetRecord>>,
}

impl MemoryResetTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResetTokenStore for MemoryResetTokenStore {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<PasswordResetRecord, StoreError> {
        let record = PasswordResetRecord {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token_hash.to_string(),
            created_at,
            expires_at,
        };
        self.records.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_active(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<PasswordResetRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.token_hash == token_hash && r.expires_at > now)
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.user_id != user_id);
        Ok((before - records.len()) as u64)
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.expires_at > now);
        Ok((before - records.len()) as u64)
    }
}
