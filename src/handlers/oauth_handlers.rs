//! Social login through an external identity provider.
//!
//! `GET /accounts/{provider}/login/` sends the browser to the provider with a
//! handoff token as OAuth `state`; the provider comes back to
//! `GET /accounts/{provider}/login/callback/`, which always ends in a redirect
//! to the frontend login page.

use crate::error::{AppError, Result};
use crate::models::{Role, User};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    pub state: Option<String>,
}

/// GET /accounts/{provider}/login/
pub async fn provider_login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<LoginParams>,
) -> Result<Redirect> {
    let provider = state
        .identity_providers
        .get(&provider)
        .ok_or_else(|| AppError::NotFound(format!("Unknown provider '{}'", provider)))?;

    // Without a prior set-role call the flow still needs a state value
    let handoff_token = match params.state.filter(|s| !s.is_empty()) {
        Some(token) => token,
        None => match state.role_handoff.put(Role::default()).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Could not store default role handoff: {}", e);
                uuid::Uuid::new_v4().to_string()
            }
        },
    };

    let url = provider.authorization_url(&handoff_token).map_err(|e| {
        tracing::error!("Failed to build {} authorization URL: {}", provider.name(), e);
        AppError::InternalError
    })?;

    Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /accounts/{provider}/login/callback/
pub async fn provider_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let account = authenticated_account(&state, &provider, &params).await;
    let outcome = state
        .oauth_completion
        .complete(account, params.state.as_deref())
        .await;
    Redirect::to(outcome.redirect_url())
}

/// Runs the code exchange and account linking. Any failure is logged and
/// treated as an unauthenticated flow.
async fn authenticated_account(
    state: &AppState,
    provider_name: &str,
    params: &CallbackParams,
) -> Option<User> {
    let Some(provider) = state.identity_providers.get(provider_name) else {
        tracing::warn!("Callback for unknown provider '{}'", provider_name);
        return None;
    };

    if let Some(error) = &params.error {
        tracing::info!("{} login aborted: {}", provider_name, error);
        return None;
    }

    let code = params.code.as_deref().filter(|c| !c.is_empty())?;

    let identity = match provider.exchange_code(code).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("{} code exchange failed: {}", provider_name, e);
            return None;
        }
    };

    match state.user_service.link_external_identity(&identity).await {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::error!(
                "Failed to link {} identity {}: {}",
                identity.provider,
                identity.subject,
                e
            );
            None
        }
    }
}
