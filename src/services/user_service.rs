use crate::models::{Role, UpdateProfileRequest, User};
use crate::repositories::{NewUser, RepositoryError, SocialAccountRepository, UserRepository};
use crate::services::identity_provider::ExternalIdentity;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::sync::Arc;

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.@+-]{1,150}$").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid username (letters, digits and @/./+/-/_ only, at most 150 characters)")]
    InvalidUsername,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password too weak (minimum 8 characters)")]
    WeakPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("User not found")]
    UserNotFound,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct CreateUserRequest {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub password_confirm: Option<String>,
    pub role: Option<Role>,
}

pub struct UpdatePasswordRequest {
    pub user_id: i64,
    pub new_password: String,
    pub new_password_confirm: Option<String>,
}

pub struct UserService {
    repository: Arc<dyn UserRepository>,
    social_accounts: Arc<dyn SocialAccountRepository>,
}

impl UserService {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        social_accounts: Arc<dyn SocialAccountRepository>,
    ) -> Self {
        Self {
            repository,
            social_accounts,
        }
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, UserServiceError> {
        self.validate_username(&request.username)?;
        if let Some(ref email) = request.email {
            self.validate_email(email)?;
        }

        // Validate password confirmation if provided
        if let Some(ref confirm) = request.password_confirm {
            if request.password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }

        self.validate_password(&request.password)?;

        if let Some(ref email) = request.email {
            if self.repository.find_by_email(email).await?.is_some() {
                return Err(UserServiceError::EmailTaken);
            }
        }

        let password_hash = self.hash_password(&request.password)?;

        let new_user = NewUser {
            username: request.username,
            email: request.email,
            password_hash,
            role: request.role,
        };

        match self.repository.create_user(new_user).await {
            Ok(user) => Ok(user),
            Err(RepositoryError::AlreadyExists) => Err(UserServiceError::UsernameTaken),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_username(username).await?)
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<User>, UserServiceError> {
        Ok(self.repository.list_users(limit, offset).await?)
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), UserServiceError> {
        match self.repository.delete_user(id).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    /// Explicit role assignment (profile edit or administrative change).
    /// Unlike OAuth reconciliation this may downgrade.
    pub async fn set_role(&self, id: i64, role: Role) -> Result<(), UserServiceError> {
        match self.repository.update_role(id, role).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        update: UpdateProfileRequest,
    ) -> Result<User, UserServiceError> {
        if let Some(ref username) = update.username {
            self.validate_username(username)?;
        }

        if let Some(ref email) = update.email {
            self.validate_email(email)?;
            if let Some(existing) = self.repository.find_by_email(email).await? {
                if existing.id != user_id {
                    return Err(UserServiceError::EmailTaken);
                }
            }
        }

        match self.repository.update_profile(user_id, update).await {
            Ok(user) => Ok(user),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(RepositoryError::AlreadyExists) => Err(UserServiceError::UsernameTaken),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn update_password(
        &self,
        request: UpdatePasswordRequest,
    ) -> Result<(), UserServiceError> {
        if let Some(ref confirm) = request.new_password_confirm {
            if request.new_password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }

        self.validate_password(&request.new_password)?;

        let password_hash = self.hash_password(&request.new_password)?;

        match self
            .repository
            .update_password(request.user_id, &password_hash)
            .await
        {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    /// Resolve the local account for an identity confirmed by an external
    /// provider, creating and linking one when needed.
    ///
    /// Lookup order: existing provider link, then an account with the same
    /// email when the provider verified it, then a new account. New accounts
    /// start without a role so the OAuth completion step decides it.
    pub async fn link_external_identity(
        &self,
        identity: &ExternalIdentity,
    ) -> Result<User, UserServiceError> {
        if let Some(user) = self.find_linked_user(identity).await? {
            return Ok(user);
        }

        let existing = match verified_email(identity) {
            Some(email) => self.repository.find_by_email(email).await?,
            None => None,
        };

        let user = match existing {
            Some(user) => user,
            None => self.create_external_user(identity).await?,
        };

        match self
            .social_accounts
            .link(user.id, &identity.provider, &identity.subject)
            .await
        {
            Ok(_) => {
                tracing::info!(
                    "Linked {} identity {} to user {}",
                    identity.provider,
                    identity.subject,
                    user.id
                );
                Ok(user)
            }
            // A concurrent callback linked the same identity first
            Err(RepositoryError::AlreadyExists) => self
                .find_linked_user(identity)
                .await?
                .ok_or(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    async fn find_linked_user(
        &self,
        identity: &ExternalIdentity,
    ) -> Result<Option<User>, UserServiceError> {
        let user_id = self
            .social_accounts
            .find_user_id(&identity.provider, &identity.subject)
            .await?;

        match user_id {
            Some(id) => Ok(self.repository.find_by_id(id).await?),
            None => Ok(None),
        }
    }

    async fn create_external_user(
        &self,
        identity: &ExternalIdentity,
    ) -> Result<User, UserServiceError> {
        let base = external_username_base(identity);
        let password_hash = self.hash_password(&generate_random_password())?;

        for attempt in 0..5 {
            let username = if attempt == 0 {
                base.clone()
            } else {
                format!("{}_{}", base, rand::thread_rng().gen_range(1000..10000))
            };

            // An unverified address may belong to someone else's account
            let new_user = NewUser {
                username,
                email: verified_email(identity).map(str::to_string),
                password_hash: password_hash.clone(),
                role: None,
            };

            match self.repository.create_user(new_user).await {
                Ok(user) => return Ok(user),
                Err(RepositoryError::AlreadyExists) => continue,
                Err(e) => return Err(UserServiceError::RepositoryError(e)),
            }
        }

        Err(UserServiceError::UsernameTaken)
    }

    fn validate_username(&self, username: &str) -> Result<(), UserServiceError> {
        if !USERNAME_PATTERN.is_match(username) {
            return Err(UserServiceError::InvalidUsername);
        }
        Ok(())
    }

    fn validate_email(&self, email: &str) -> Result<(), UserServiceError> {
        if !email.contains('@') || email.len() > 255 || email.is_empty() {
            return Err(UserServiceError::InvalidEmail);
        }
        Ok(())
    }

    fn validate_password(&self, password: &str) -> Result<(), UserServiceError> {
        if password.len() < 8 {
            return Err(UserServiceError::WeakPassword);
        }
        Ok(())
    }

    fn hash_password(&self, password: &str) -> Result<String, UserServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| UserServiceError::HashingError(e.to_string()))
    }

    pub fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        if let Ok(parsed_hash) = PasswordHash::new(password_hash) {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok()
        } else {
            false
        }
    }
}

fn verified_email(identity: &ExternalIdentity) -> Option<&str> {
    identity.email.as_deref().filter(|_| identity.email_verified)
}

/// Candidate username for an account created from an external identity.
fn external_username_base(identity: &ExternalIdentity) -> String {
    let raw = identity
        .username
        .clone()
        .or_else(|| {
            identity
                .email
                .as_deref()
                .and_then(|email| email.split('@').next())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("{}_{}", identity.provider, identity.subject));

    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "_.@+-".contains(*c))
        .take(140)
        .collect();

    if cleaned.is_empty() {
        format!("{}_{}", identity.provider, identity.subject)
    } else {
        cleaned
    }
}

fn generate_random_password() -> String {
    let mut rng = rand::thread_rng();
    let charset: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
    (0..24)
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .collect()
}
