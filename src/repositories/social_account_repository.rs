use super::{is_unique_violation, RepositoryError, RepositoryResult};
use crate::models::SocialAccount;
use async_trait::async_trait;
use sqlx::SqlitePool;

#[async_trait]
pub trait SocialAccountRepository: Send + Sync {
    async fn find_user_id(&self, provider: &str, provider_uid: &str)
        -> RepositoryResult<Option<i64>>;
    async fn link(
        &self,
        user_id: i64,
        provider: &str,
        provider_uid: &str,
    ) -> RepositoryResult<SocialAccount>;
}

pub struct SqliteSocialAccountRepository {
    pool: SqlitePool,
}

impl SqliteSocialAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SocialAccountRepository for SqliteSocialAccountRepository {
    async fn find_user_id(
        &self,
        provider: &str,
        provider_uid: &str,
    ) -> RepositoryResult<Option<i64>> {
        let user_id = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM social_accounts WHERE provider = ? AND provider_uid = ?",
        )
        .bind(provider)
        .bind(provider_uid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id)
    }

    async fn link(
        &self,
        user_id: i64,
        provider: &str,
        provider_uid: &str,
    ) -> RepositoryResult<SocialAccount> {
        let result = sqlx::query_as::<_, SocialAccount>(
            r#"
            INSERT INTO social_accounts (user_id, provider, provider_uid)
            VALUES (?, ?, ?)
            RETURNING id, user_id, provider, provider_uid, created_at
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(provider_uid)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(link) => Ok(link),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::AlreadyExists),
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }
}
