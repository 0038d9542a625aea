use super::RepositoryResult;
use crate::models::{CreateSessionRequest, Session, UpdateSessionRequest};
use async_trait::async_trait;
use sqlx::SqlitePool;

const SESSION_COLUMNS: &str =
    "id, creator_id, title, description, date, price, image, created_at";

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, creator_id: i64, request: CreateSessionRequest)
        -> RepositoryResult<Session>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Session>>;
    async fn list_all(&self) -> RepositoryResult<Vec<Session>>;
    async fn list_by_creator(&self, creator_id: i64) -> RepositoryResult<Vec<Session>>;
    async fn update(
        &self,
        id: i64,
        request: UpdateSessionRequest,
    ) -> RepositoryResult<Option<Session>>;
    async fn delete(&self, id: i64) -> RepositoryResult<bool>;
}

pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn create(
        &self,
        creator_id: i64,
        request: CreateSessionRequest,
    ) -> RepositoryResult<Session> {
        let sql = format!(
            r#"
            INSERT INTO sessions (creator_id, title, description, date, price, image)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, Session>(&sql)
            .bind(creator_id)
            .bind(request.title)
            .bind(request.description)
            .bind(request.date)
            .bind(request.price)
            .bind(request.image)
            .fetch_one(&self.pool)
            .await?;

        Ok(session)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Session>> {
        let sql = format!("SELECT {} FROM sessions WHERE id = ?", SESSION_COLUMNS);
        let session = sqlx::query_as::<_, Session>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn list_all(&self) -> RepositoryResult<Vec<Session>> {
        let sql = format!(
            "SELECT {} FROM sessions ORDER BY created_at DESC, id DESC",
            SESSION_COLUMNS
        );
        let sessions = sqlx::query_as::<_, Session>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(sessions)
    }

    async fn list_by_creator(&self, creator_id: i64) -> RepositoryResult<Vec<Session>> {
        let sql = format!(
            "SELECT {} FROM sessions WHERE creator_id = ? ORDER BY created_at DESC, id DESC",
            SESSION_COLUMNS
        );
        let sessions = sqlx::query_as::<_, Session>(&sql)
            .bind(creator_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(sessions)
    }

    async fn update(
        &self,
        id: i64,
        request: UpdateSessionRequest,
    ) -> RepositoryResult<Option<Session>> {
        let sql = format!(
            r#"
            UPDATE sessions
            SET title = COALESCE(?, title),
                description = COALESCE(?, description),
                date = COALESCE(?, date),
                price = COALESCE(?, price),
                image = COALESCE(?, image)
            WHERE id = ?
            RETURNING {}
            "#,
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, Session>(&sql)
            .bind(request.title)
            .bind(request.description)
            .bind(request.date)
            .bind(request.price)
            .bind(request.image)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn delete(&self, id: i64) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
