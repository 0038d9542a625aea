//! Bearer-token authentication for the JSON API.

use crate::models::{Role, User};
use crate::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication credentials were not provided")]
    MissingAuthorizationHeader,
    #[error("Authorization header must use the Bearer scheme")]
    InvalidAuthorizationFormat,
    #[error("Given token not valid for any token type")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut response = (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        response
    }
}

/// The account behind a validated access token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn is_creator(&self) -> bool {
        self.0.role == Some(Role::Creator)
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuthorizationHeader)
    }
}

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthorizationHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorizationFormat)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidAuthorizationFormat)?;

    Ok(token.to_string())
}

/// Rejects requests without a valid access token and attaches the
/// authenticated account to the request for handlers to use.
pub async fn require_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_bearer_token(&headers)?;

    let validated = state
        .credential_service
        .validate_access_token(&token)
        .await
        .map_err(|e| {
            tracing::debug!("Access token rejected: {}", e);
            AuthError::InvalidToken
        })?;

    let user = match state.user_service.find_user_by_id(validated.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(AuthError::InvalidToken),
        Err(e) => {
            tracing::error!("Failed to load user {}: {}", validated.user_id, e);
            return Err(AuthError::InvalidToken);
        }
    };

    request.extensions_mut().insert(AuthUser(user));
    Ok(next.run(request).await)
}
