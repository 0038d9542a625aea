//! Final step of a third-party sign-in: settle the account's role and hand
//! the browser back to the frontend with fresh credentials.
//!
//! Nothing here returns an error. Every failure degrades to the default role
//! or to the credential-less login redirect.

use crate::models::{Role, User};
use crate::repositories::UserRepository;
use crate::services::credential_service::CredentialIssuer;
use crate::services::role_handoff::RoleHandoffStore;
use std::sync::Arc;

/// Role an account should end up with after signing in with `resolved`.
///
/// | current   | resolved | result  |
/// |-----------|----------|---------|
/// | none      | any      | resolved|
/// | any       | creator  | creator |
/// | creator   | user     | creator |
/// | user      | user     | user    |
pub fn reconcile_role(current: Option<Role>, resolved: Role) -> Role {
    match (current, resolved) {
        (None, resolved) => resolved,
        (Some(_), Role::Creator) => Role::Creator,
        (Some(Role::Creator), Role::User) => Role::Creator,
        (Some(Role::User), Role::User) => Role::User,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    SignedIn {
        user_id: i64,
        role: Role,
        redirect_url: String,
    },
    LoginRequired {
        redirect_url: String,
    },
}

impl CompletionOutcome {
    pub fn redirect_url(&self) -> &str {
        match self {
            CompletionOutcome::SignedIn { redirect_url, .. } => redirect_url,
            CompletionOutcome::LoginRequired { redirect_url } => redirect_url,
        }
    }
}

pub struct OAuthCompletion {
    handoff: Arc<dyn RoleHandoffStore>,
    users: Arc<dyn UserRepository>,
    credentials: Arc<dyn CredentialIssuer>,
    login_url: String,
}

impl OAuthCompletion {
    pub fn new(
        handoff: Arc<dyn RoleHandoffStore>,
        users: Arc<dyn UserRepository>,
        credentials: Arc<dyn CredentialIssuer>,
        login_url: String,
    ) -> Self {
        Self {
            handoff,
            users,
            credentials,
            login_url,
        }
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    /// Outcome for a flow that never produced an authenticated account.
    pub fn login_required(&self) -> CompletionOutcome {
        CompletionOutcome::LoginRequired {
            redirect_url: self.login_url.clone(),
        }
    }

    /// Completes sign-in for `account`, the local account linked to the
    /// provider identity, or `None` when the provider rejected the attempt.
    /// `state` is the handoff token echoed back by the provider.
    pub async fn complete(&self, account: Option<User>, state: Option<&str>) -> CompletionOutcome {
        // The token is consumed even when authentication failed, so it cannot
        // be replayed by a later attempt.
        let resolved = match state.filter(|s| !s.is_empty()) {
            Some(token) => self.handoff.take_role(token).await,
            None => Role::default(),
        };

        let Some(user) = account else {
            tracing::debug!("OAuth flow ended without an authenticated account");
            return self.login_required();
        };

        let role = self.apply_role(&user, resolved).await;

        match self.credentials.issue_pair(user.id).await {
            Ok(pair) => {
                tracing::info!("User {} signed in via OAuth as '{}'", user.id, role);
                CompletionOutcome::SignedIn {
                    user_id: user.id,
                    role,
                    redirect_url: self.credential_redirect(&pair.access, &pair.refresh),
                }
            }
            Err(e) => {
                tracing::error!("Failed to mint credentials for user {}: {:#}", user.id, e);
                self.login_required()
            }
        }
    }

    /// Persists the reconciled role when it differs from the stored one and
    /// returns the role the account effectively has afterwards.
    async fn apply_role(&self, user: &User, resolved: Role) -> Role {
        let target = reconcile_role(user.role, resolved);
        if user.role == Some(target) {
            return target;
        }

        match self.users.update_role(user.id, target).await {
            Ok(()) => {
                tracing::debug!(
                    "Role of user {} changed from {:?} to '{}'",
                    user.id,
                    user.role,
                    target
                );
                target
            }
            Err(e) => {
                tracing::warn!("Failed to persist role for user {}: {}", user.id, e);
                user.role.unwrap_or_default()
            }
        }
    }

    // Credentials travel in the query string because the frontend reads them
    // from the landing URL.
    fn credential_redirect(&self, access: &str, refresh: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("access", access)
            .append_pair("refresh", refresh)
            .finish();
        let separator = if self.login_url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.login_url, separator, query)
    }
}
