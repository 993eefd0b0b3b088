use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::PublicUser;

pub const DEFAULT_PHOTO: &str = "https://via.placeholder.com/150";
pub const DEFAULT_PHONE: &str = "+1-000-000-0000";
pub const DEFAULT_BIO: &str = "bio";

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub photo: String,
    pub phone: String,
    pub bio: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            photo: self.photo.clone(),
            phone: self.phone.clone(),
            bio: self.bio.clone(),
        }
    }
}

/// Registration input. The store hashes `password` before it persists anything.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Profile fields to replace; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub photo: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
}

/// One refresh session. The raw token is never stored, only its SHA-256.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Outstanding password-reset grant, at most one per user.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}
