use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub is_verified: bool,
    #[serde(skip)]
    pub verification_token_hash: Option<Vec<u8>>,
    #[serde(skip)]
    reset_token_hash: Option<Vec<u8>>,
    #[serde(skip)]
    reset_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl User {
    /// Marks the address as confirmed and drops the one-time token.
    pub fn mark_verified(&mut self) {
        self.is_verified = true;
        self.verification_token_hash = None;
    }

    /// Replaces any pending reset with a new token hash and expiry.
    pub fn begin_reset(&mut self, token_hash: Vec<u8>, expires_at: OffsetDateTime) {
        self.reset_token_hash = Some(token_hash);
        self.reset_expires_at = Some(expires_at);
    }

    pub fn clear_reset(&mut self) {
        self.reset_token_hash = None;
        self.reset_expires_at = None;
    }

    pub fn reset_token_hash(&self) -> Option<&[u8]> {
        self.reset_token_hash.as_deref()
    }

    pub fn reset_expires_at(&self) -> Option<OffsetDateTime> {
        self.reset_expires_at
    }

    /// True while a reset token exists and `now` is strictly before its expiry.
    pub fn reset_pending_at(&self, now: OffsetDateTime) -> bool {
        matches!(self.reset_expires_at, Some(exp) if exp > now) && self.reset_token_hash.is_some()
    }
}

/// Fields of a freshly registered, unverified user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub verification_token_hash: Vec<u8>,
}

impl NewUser {
    pub fn into_user(self, id: Uuid, created_at: OffsetDateTime) -> User {
        User {
            id,
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
            is_verified: false,
            verification_token_hash: Some(self.verification_token_hash),
            reset_token_hash: None,
            reset_expires_at: None,
            created_at,
        }
    }
}
