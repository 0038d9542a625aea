use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Stored bearer credential; only the SHA-256 digest of the token is kept.
#[derive(Debug, Clone, FromRow)]
pub struct StoredToken {
    pub id: i64,
    pub token_hash: String,
    pub user_id: i64,
    pub expires_at: i64,
    pub created_at: i64,
}

impl StoredToken {
    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() >= self.expires_at
    }
}

/// Freshly minted access + refresh pair. The plaintext values only exist here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}
