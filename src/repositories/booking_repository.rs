use super::{is_unique_violation, RepositoryError, RepositoryResult};
use crate::models::Booking;
use async_trait::async_trait;
use sqlx::SqlitePool;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait BookingRepository: Send + Sync {
    /// Inserts a booking. A second booking for the same (user, session)
    /// pair fails with `RepositoryError::AlreadyExists`.
    async fn create(&self, user_id: i64, session_id: i64) -> RepositoryResult<Booking>;
    async fn exists_for(&self, user_id: i64, session_id: i64) -> RepositoryResult<bool>;
    async fn count_for(&self, user_id: i64, session_id: i64) -> RepositoryResult<i64>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Booking>>;
    async fn list_by_user(&self, user_id: i64) -> RepositoryResult<Vec<Booking>>;
    async fn list_by_session(&self, session_id: i64) -> RepositoryResult<Vec<Booking>>;
    async fn delete(&self, id: i64) -> RepositoryResult<bool>;
}

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn create(&self, user_id: i64, session_id: i64) -> RepositoryResult<Booking> {
        let result = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (user_id, session_id)
            VALUES (?, ?)
            RETURNING id, user_id, session_id, booked_at
            "#,
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(booking) => Ok(booking),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::AlreadyExists),
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }

    async fn exists_for(&self, user_id: i64, session_id: i64) -> RepositoryResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM bookings WHERE user_id = ? AND session_id = ?)",
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn count_for(&self, user_id: i64, session_id: i64) -> RepositoryResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM bookings WHERE user_id = ? AND session_id = ?",
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT id, user_id, session_id, booked_at FROM bookings WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn list_by_user(&self, user_id: i64) -> RepositoryResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT id, user_id, session_id, booked_at
            FROM bookings
            WHERE user_id = ?
            ORDER BY booked_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn list_by_session(&self, session_id: i64) -> RepositoryResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT id, user_id, session_id, booked_at
            FROM bookings
            WHERE session_id = ?
            ORDER BY booked_at ASC, id ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn delete(&self, id: i64) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
