use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// One persisted refresh credential. Only the SHA-256 digest of the
/// secret is stored; the plaintext exists once, in the response that
/// delivered it to the client.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub device_info: Option<String>,
}

impl RefreshTokenRecord {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Active iff not revoked and not yet expired. Expiry is a
    /// query-time check, never an explicit transition.
    pub fn is_active(&self) -> bool {
        !self.is_revoked() && !self.is_expired()
    }
}
