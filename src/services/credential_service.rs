use crate::models::{CredentialPair, StoredToken};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::time::Duration;

const ACCESS_PREFIX: &str = "sm_at_";
const REFRESH_PREFIX: &str = "sm_rt_";

/// Mints bearer credentials for an account.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait CredentialIssuer: Send + Sync {
    async fn issue_pair(&self, user_id: i64) -> Result<CredentialPair>;
}

/// Validated access token information
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    pub user_id: i64,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct CredentialService {
    pool: SqlitePool,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl CredentialService {
    pub fn new(pool: SqlitePool, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            pool,
            access_ttl,
            refresh_ttl,
        }
    }

    fn generate_token(prefix: &str) -> String {
        let mut rng = rand::thread_rng();
        let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
        format!("{}{}", prefix, hex::encode(bytes))
    }

    /// Hash a token using SHA-256 (shared utility for access/refresh tokens)
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Generate access token
    pub async fn create_access_token(&self, user_id: i64) -> Result<(String, i64)> {
        let token = Self::generate_token(ACCESS_PREFIX);
        let token_hash = Self::hash_token(&token);
        let expires_at = expiry_after(self.access_ttl);

        sqlx::query("INSERT INTO access_tokens (token_hash, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&token_hash)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

        Ok((token, expires_at))
    }

    /// Generate refresh token
    pub async fn create_refresh_token(&self, user_id: i64) -> Result<String> {
        let token = Self::generate_token(REFRESH_PREFIX);
        let token_hash = Self::hash_token(&token);
        let expires_at = expiry_after(self.refresh_ttl);

        sqlx::query(
            "INSERT INTO refresh_tokens (token_hash, user_id, expires_at) VALUES (?, ?, ?)",
        )
        .bind(&token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    /// Validate an access token and return token information
    ///
    /// Returns Err if token is invalid, expired, or not found
    pub async fn validate_access_token(&self, token: &str) -> Result<ValidatedToken> {
        let token_hash = Self::hash_token(token);

        let record = sqlx::query_as::<_, StoredToken>(
            r#"
            SELECT id, token_hash, user_id, expires_at, created_at
            FROM access_tokens
            WHERE token_hash = ?
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| anyhow!("Invalid access token"))?;

        if record.is_expired() {
            bail!("Access token expired");
        }

        Ok(ValidatedToken {
            user_id: record.user_id,
            expires_at: record.expires_at,
        })
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The refresh token stays valid until it expires.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<String> {
        let token_hash = Self::hash_token(refresh_token);

        let stored = sqlx::query_as::<_, StoredToken>(
            r#"
            SELECT id, token_hash, user_id, expires_at, created_at
            FROM refresh_tokens
            WHERE token_hash = ?
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| anyhow!("Invalid refresh token"))?;

        if stored.is_expired() {
            bail!("Refresh token expired");
        }

        let (access, _expires_at) = self.create_access_token(stored.user_id).await?;
        Ok(access)
    }

    /// Accepts either kind of token, mirroring a generic verify endpoint.
    pub async fn verify_token(&self, token: &str) -> Result<i64> {
        if token.starts_with(REFRESH_PREFIX) {
            let token_hash = Self::hash_token(token);
            let stored = sqlx::query_as::<_, StoredToken>(
                r#"
                SELECT id, token_hash, user_id, expires_at, created_at
                FROM refresh_tokens
                WHERE token_hash = ?
                "#,
            )
            .bind(&token_hash)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| anyhow!("Invalid token"))?;

            if stored.is_expired() {
                bail!("Token expired");
            }
            return Ok(stored.user_id);
        }

        Ok(self.validate_access_token(token).await?.user_id)
    }

    /// Revoke every credential held by an account.
    pub async fn revoke_all(&self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM access_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn cleanup_expired_tokens(&self) -> Result<u64> {
        let now = Utc::now().timestamp();

        let access = sqlx::query("DELETE FROM access_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        let refresh = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(access.rows_affected() + refresh.rows_affected())
    }
}

#[async_trait]
impl CredentialIssuer for CredentialService {
    async fn issue_pair(&self, user_id: i64) -> Result<CredentialPair> {
        let (access, _expires_at) = self.create_access_token(user_id).await?;
        let refresh = self.create_refresh_token(user_id).await?;
        Ok(CredentialPair { access, refresh })
    }
}

/// Unix timestamp `ttl` from now. Saturates instead of wrapping for TTLs
/// beyond the `i64` range.
pub(crate) fn expiry_after(ttl: Duration) -> i64 {
    let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    Utc::now().timestamp().saturating_add(secs)
}
