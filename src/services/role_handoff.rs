//! Carries a requested role across the redirect to an external identity
//! provider.
//!
//! The client calls `put` before leaving for the provider and hands the
//! returned token to the provider as the OAuth `state` parameter. When the
//! provider redirects back, `take_role` consumes the token. Lookups never fail:
//! a missing, expired, replayed or unreadable token resolves to [`Role::User`],
//! so a lost handoff only downgrades the role intent and never blocks sign-in.

use crate::models::Role;
use crate::services::credential_service::expiry_after;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait RoleHandoffStore: Send + Sync {
    /// Stores `role` under a fresh 128-bit random token and returns the token.
    async fn put(&self, role: Role) -> Result<String, HandoffError>;

    /// Removes the entry for `token` and returns its role. Each token is
    /// consumed at most once; anything else yields the default role.
    async fn take_role(&self, token: &str) -> Role;

    /// Drops entries whose expiry has passed. Returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, HandoffError>;
}

fn new_token() -> String {
    Uuid::new_v4().to_string()
}

// ============================================================================
// In-memory backend
// ============================================================================

struct PendingRole {
    role: Role,
    expires_at: tokio::time::Instant,
}

/// Process-local store. Entries do not survive a restart and are not shared
/// between instances; use [`SqliteRoleHandoffStore`] for that.
pub struct InMemoryRoleHandoffStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, PendingRole>>,
}

impl InMemoryRoleHandoffStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl RoleHandoffStore for InMemoryRoleHandoffStore {
    async fn put(&self, role: Role) -> Result<String, HandoffError> {
        let token = new_token();
        let entry = PendingRole {
            role,
            expires_at: tokio::time::Instant::now() + self.ttl,
        };
        self.entries.lock().await.insert(token.clone(), entry);
        tracing::debug!("Stored role '{}' for OAuth handoff", role);
        Ok(token)
    }

    async fn take_role(&self, token: &str) -> Role {
        let entry = self.entries.lock().await.remove(token);
        match entry {
            Some(entry) if entry.expires_at > tokio::time::Instant::now() => entry.role,
            Some(_) => {
                tracing::debug!("Role handoff token expired, using default role");
                Role::default()
            }
            None => Role::default(),
        }
    }

    async fn purge_expired(&self) -> Result<u64, HandoffError> {
        let now = tokio::time::Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}

// ============================================================================
// Database backend
// ============================================================================

/// Store backed by the `role_handoffs` table, so a handoff started on one
/// instance can be completed on another and survives restarts.
pub struct SqliteRoleHandoffStore {
    pool: SqlitePool,
    ttl: Duration,
}

impl SqliteRoleHandoffStore {
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    async fn consume(&self, token: &str) -> Result<Option<(Role, i64)>, HandoffError> {
        // DELETE .. RETURNING makes lookup and removal a single statement, so two
        // concurrent callbacks cannot both observe the same entry.
        let row = sqlx::query_as::<_, (Role, i64)>(
            "DELETE FROM role_handoffs WHERE token = ? RETURNING role, expires_at",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl RoleHandoffStore for SqliteRoleHandoffStore {
    async fn put(&self, role: Role) -> Result<String, HandoffError> {
        let token = new_token();
        let expires_at = expiry_after(self.ttl);

        sqlx::query("INSERT INTO role_handoffs (token, role, expires_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(role)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Stored role '{}' for OAuth handoff", role);
        Ok(token)
    }

    async fn take_role(&self, token: &str) -> Role {
        match self.consume(token).await {
            Ok(Some((role, expires_at))) if expires_at > Utc::now().timestamp() => role,
            Ok(Some(_)) => {
                tracing::debug!("Role handoff token expired, using default role");
                Role::default()
            }
            Ok(None) => Role::default(),
            Err(e) => {
                tracing::warn!("Role handoff lookup failed, using default role: {}", e);
                Role::default()
            }
        }
    }

    async fn purge_expired(&self) -> Result<u64, HandoffError> {
        let result = sqlx::query("DELETE FROM role_handoffs WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
