pub mod test_helpers {
    use crate::config::{AppConfig, HandoffBackend};
    use crate::models::Role;
    use crate::services::{IdentityProviderRegistry, InMemoryRoleHandoffStore};
    use crate::AppState;
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use std::net::IpAddr;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    pub const TEST_LOGIN_URL: &str = "http://frontend.test/login";

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing
    /// Useful when several connections must see the same data
    pub async fn create_test_db_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;
        let database_url = format!("sqlite://{}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&database_url)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    /// Insert a test user with hashed password
    pub async fn insert_test_user(
        pool: &SqlitePool,
        username: &str,
        email: Option<&str>,
        password: &str,
        role: Option<Role>,
    ) -> Result<i64, sqlx::Error> {
        use argon2::{
            password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
            Argon2,
        };

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                sqlx::Error::Configuration(format!("Password hashing failed: {}", e).into())
            })?
            .to_string();

        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Create a test session owned by `creator_id`
    pub async fn create_test_session(
        pool: &SqlitePool,
        creator_id: i64,
        title: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO sessions (creator_id, title, description, date, price) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(creator_id)
        .bind(title)
        .bind("Test session description")
        .bind(chrono::Utc::now() + chrono::Duration::days(7))
        .bind(20.0_f64)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub fn test_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            environment: "test".to_string(),
            frontend_login_url: TEST_LOGIN_URL.to_string(),
            public_base_url: "http://api.test".to_string(),
            media_root: PathBuf::from("media"),
            handoff_backend: HandoffBackend::Memory,
            handoff_ttl: Duration::from_secs(600),
            access_token_ttl: Duration::from_secs(3600),
            refresh_token_ttl: Duration::from_secs(86400),
            cors_allowed_origins: vec![],
            google: None,
            github: None,
        }
    }

    /// Application state over `pool` with an in-memory handoff store.
    pub fn test_app_state(pool: SqlitePool, providers: IdentityProviderRegistry) -> AppState {
        let config = test_config();
        let handoff = Arc::new(InMemoryRoleHandoffStore::new(config.handoff_ttl));
        AppState::new(pool, config, handoff, providers)
    }
}

// Re-export commonly used test functions at module level for convenience
// Note: This is test-only code. Panic on error is acceptable in tests.
#[cfg(test)]
pub async fn create_test_pool() -> sqlx::SqlitePool {
    match test_helpers::create_test_db().await {
        Ok(pool) => pool,
        Err(e) => panic!("Failed to create test pool: {}", e),
    }
}
