//! Third-party login through the OAuth 2.0 authorization-code flow.
//!
//! An [`IdentityProvider`] knows where to send the browser and how to turn the
//! `code` it gets back into an [`ExternalIdentity`]. Everything beyond that
//! (linking to a local account, choosing a role, minting credentials) happens
//! elsewhere.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum IdentityProviderError {
    #[error("HTTP request to identity provider failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Identity provider rejected the request: {0}")]
    Rejected(String),
    #[error("Identity provider response is missing '{0}'")]
    MissingField(&'static str),
    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),
}

/// Identity asserted by an external provider after a successful exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalIdentity {
    pub provider: String,
    pub subject: String,
    pub email: Option<String>,
    /// Whether the provider vouches that `email` belongs to this identity.
    pub email_verified: bool,
    pub username: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &str;

    /// URL the browser is redirected to; `state` is echoed back on callback.
    fn authorization_url(&self, state: &str) -> Result<String, IdentityProviderError>;

    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, IdentityProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    GitHub,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    /// GitHub only: lists the account's addresses with their verification state.
    pub emails_url: Option<String>,
    pub scope: String,
    pub redirect_uri: String,
}

impl ProviderConfig {
    pub fn google(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            kind: ProviderKind::Google,
            client_id,
            client_secret,
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            emails_url: None,
            scope: "openid email profile".to_string(),
            redirect_uri,
        }
    }

    pub fn github(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            kind: ProviderKind::GitHub,
            client_id,
            client_secret,
            authorize_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            userinfo_url: "https://api.github.com/user".to_string(),
            emails_url: Some("https://api.github.com/user/emails".to_string()),
            scope: "read:user user:email".to_string(),
            redirect_uri,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            ProviderKind::Google => "google",
            ProviderKind::GitHub => "github",
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub struct HttpIdentityProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl HttpIdentityProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, IdentityProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sessionmart/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self { config, client })
    }

    async fn fetch_access_token(&self, code: &str) -> Result<String, IdentityProviderError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self
            .client
            .post(&self.config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body: TokenResponse = response.json().await?;

        if let Some(error) = body.error {
            let detail = body.error_description.unwrap_or_default();
            return Err(IdentityProviderError::Rejected(
                format!("{} {}", error, detail).trim().to_string(),
            ));
        }
        if !status.is_success() {
            return Err(IdentityProviderError::Rejected(format!(
                "token endpoint returned {}",
                status
            )));
        }

        body.access_token
            .ok_or(IdentityProviderError::MissingField("access_token"))
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, IdentityProviderError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IdentityProviderError::Rejected(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// Primary verified address from GitHub's email list, which also covers
    /// accounts whose profile email is private.
    async fn fetch_verified_email(
        &self,
        access_token: &str,
    ) -> Result<Option<String>, IdentityProviderError> {
        let Some(url) = self.config.emails_url.as_deref() else {
            return Ok(None);
        };
        let emails: Vec<GitHubEmail> = self.fetch_json(url, access_token).await?;
        Ok(emails
            .into_iter()
            .find(|entry| entry.primary && entry.verified)
            .map(|entry| entry.email))
    }

    fn identity_from_userinfo(
        &self,
        info: &Value,
    ) -> Result<ExternalIdentity, IdentityProviderError> {
        let string_field = |key: &str| {
            info.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let (subject, username) = match self.config.kind {
            ProviderKind::Google => (
                string_field("sub").ok_or(IdentityProviderError::MissingField("sub"))?,
                string_field("email")
                    .and_then(|email| email.split('@').next().map(str::to_string))
                    .or_else(|| string_field("name")),
            ),
            ProviderKind::GitHub => (
                // GitHub ids are numeric
                info.get("id")
                    .and_then(|id| {
                        id.as_i64()
                            .map(|n| n.to_string())
                            .or_else(|| id.as_str().map(str::to_string))
                    })
                    .ok_or(IdentityProviderError::MissingField("id"))?,
                string_field("login"),
            ),
        };

        // Google states verification in the claim, sometimes as a string.
        // GitHub's profile email carries no such claim.
        let email_verified = match self.config.kind {
            ProviderKind::Google => match info.get("email_verified") {
                Some(Value::Bool(verified)) => *verified,
                Some(Value::String(verified)) => verified.eq_ignore_ascii_case("true"),
                _ => false,
            },
            ProviderKind::GitHub => false,
        };

        Ok(ExternalIdentity {
            provider: self.config.name().to_string(),
            subject,
            email: string_field("email"),
            email_verified,
            username,
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    fn name(&self) -> &str {
        self.config.name()
    }

    fn authorization_url(&self, state: &str) -> Result<String, IdentityProviderError> {
        let url = Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", self.config.scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| IdentityProviderError::InvalidUrl(e.to_string()))?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, IdentityProviderError> {
        let access_token = self.fetch_access_token(code).await?;
        let info: Value = self
            .fetch_json(&self.config.userinfo_url, &access_token)
            .await?;
        let mut identity = self.identity_from_userinfo(&info)?;

        if self.config.emails_url.is_some() {
            match self.fetch_verified_email(&access_token).await {
                Ok(Some(email)) => {
                    identity.email = Some(email);
                    identity.email_verified = true;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    "Could not list emails for {} subject {}: {}",
                    identity.provider,
                    identity.subject,
                    e
                ),
            }
        }

        tracing::debug!(
            "Identity provider '{}' confirmed subject {} (email verified: {})",
            identity.provider,
            identity.subject,
            identity.email_verified
        );
        Ok(identity)
    }
}

/// Configured providers, keyed by name (`google`, `github`).
#[derive(Clone, Default)]
pub struct IdentityProviderRegistry {
    providers: HashMap<String, Arc<dyn IdentityProvider>>,
}

impl IdentityProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn IdentityProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn IdentityProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}
