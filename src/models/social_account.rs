use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Link between a local account and an identity at an external provider.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SocialAccount {
    pub id: i64,
    pub user_id: i64,
    pub provider: String,
    pub provider_uid: String,
    pub created_at: DateTime<Utc>,
}
