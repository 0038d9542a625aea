use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
    #[error("Production environment requires HTTPS for {0}")]
    InsecureUrl(&'static str),
}

/// Where pending role selections live between the login redirect and the
/// provider callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffBackend {
    Database,
    Memory,
}

impl FromStr for HandoffBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "database" | "db" | "sqlite" => Ok(HandoffBackend::Database),
            "memory" | "in-memory" => Ok(HandoffBackend::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub environment: String,
    pub frontend_login_url: String,
    pub public_base_url: String,
    pub media_root: PathBuf,
    pub handoff_backend: HandoffBackend,
    pub handoff_ttl: Duration,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub cors_allowed_origins: Vec<String>,
    pub google: Option<OAuthClientConfig>,
    pub github: Option<OAuthClientConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let handoff_backend = match env::var("ROLE_HANDOFF_BACKEND") {
            Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "ROLE_HANDOFF_BACKEND",
                value,
            })?,
            Err(_) => HandoffBackend::Database,
        };

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url,
            host: parse_var("HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: parse_var("PORT", 8000)?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            frontend_login_url: env::var("FRONTEND_LOGIN_URL")
                .unwrap_or_else(|_| "http://localhost/login".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            media_root: env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("media")),
            handoff_backend,
            handoff_ttl: parse_ttl("ROLE_HANDOFF_TTL_SECS", 600)?,
            access_token_ttl: parse_ttl("ACCESS_TOKEN_TTL_SECS", 3600)?,
            refresh_token_ttl: parse_ttl("REFRESH_TOKEN_TTL_SECS", 604_800)?,
            cors_allowed_origins,
            google: oauth_client("GOOGLE"),
            github: oauth_client("GITHUB"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Callback URL registered with the identity provider.
    pub fn oauth_redirect_uri(&self, provider: &str) -> String {
        format!(
            "{}/accounts/{}/login/callback/",
            self.public_base_url, provider
        )
    }
}

/// Refuses to run a production deployment over plain HTTP.
pub fn validate_production_config(config: &AppConfig) -> Result<(), ConfigError> {
    if !config.is_production() {
        return Ok(());
    }

    if !config.public_base_url.starts_with("https://") {
        return Err(ConfigError::InsecureUrl("PUBLIC_BASE_URL"));
    }
    if !config.frontend_login_url.starts_with("https://") {
        return Err(ConfigError::InsecureUrl("FRONTEND_LOGIN_URL"));
    }
    Ok(())
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

/// Lifetimes above ten years are treated as configuration mistakes.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn parse_ttl(key: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let secs = parse_var(key, default)?;
    if secs > MAX_TTL_SECS {
        return Err(ConfigError::Invalid {
            key,
            value: secs.to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn oauth_client(prefix: &str) -> Option<OAuthClientConfig> {
    let client_id = env::var(format!("{}_CLIENT_ID", prefix)).ok()?;
    let client_secret = env::var(format!("{}_CLIENT_SECRET", prefix)).ok()?;
    if client_id.is_empty() || client_secret.is_empty() {
        return None;
    }
    Some(OAuthClientConfig {
        client_id,
        client_secret,
    })
}
