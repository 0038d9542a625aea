use crate::error::{AppError, Result};
use crate::models::{Role, UserProfile};
use crate::services::{CreateUserRequest, CredentialIssuer, LoginRequest};
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
pub struct SetRoleRequest {
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SetRoleResponse {
    pub status: &'static str,
    pub role: Role,
    pub state: String,
}

/// POST /api/auth/set-role/ - Remember the role picked before a social login
///
/// The returned `state` must be passed to `/accounts/{provider}/login/` so the
/// callback can recover the role. A missing role means `user`.
pub async fn set_role(
    State(state): State<AppState>,
    Json(request): Json<SetRoleRequest>,
) -> Result<Json<SetRoleResponse>> {
    let role = match request.role.as_deref() {
        Some(raw) => raw
            .parse::<Role>()
            .map_err(|e| AppError::Validation(e.to_string()))?,
        None => Role::default(),
    };

    let token = state.role_handoff.put(role).await?;

    Ok(Json(SetRoleResponse {
        status: "success",
        role,
        state: token,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    #[serde(default)]
    pub password_confirm: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub user: UserProfile,
    pub access: String,
    pub refresh: String,
}

/// POST /api/auth/registration/ - Create a password account and sign it in
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegistrationRequest>,
) -> Result<impl IntoResponse> {
    let email = request
        .email
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty());

    let user = state
        .user_service
        .create_user(CreateUserRequest {
            username: request.username.trim().to_string(),
            email,
            password: request.password,
            password_confirm: request.password_confirm,
            role: Some(request.role.unwrap_or_default()),
        })
        .await?;

    tracing::info!("Registered user {} ({})", user.id, user.username);

    let pair = state.credential_service.issue_pair(user.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            user: UserProfile::from(user),
            access: pair.access,
            refresh: pair.refresh,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct TokenObtainRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/token/ - Exchange username and password for a credential pair
pub async fn obtain_token(
    State(state): State<AppState>,
    Json(request): Json<TokenObtainRequest>,
) -> Result<impl IntoResponse> {
    let user = state
        .auth_service
        .authenticate(LoginRequest {
            username: request.username,
            password: request.password,
        })
        .await?;

    let pair = state.credential_service.issue_pair(user.id).await?;
    Ok(Json(pair))
}

#[derive(Debug, Deserialize)]
pub struct TokenRefreshRequest {
    pub refresh: String,
}

/// POST /api/token/refresh/
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRefreshRequest>,
) -> Result<impl IntoResponse> {
    let access = state
        .credential_service
        .refresh_access_token(&request.refresh)
        .await
        .map_err(|e| {
            tracing::debug!("Refresh rejected: {}", e);
            AppError::AuthenticationFailed
        })?;

    Ok(Json(json!({ "access": access })))
}

#[derive(Debug, Deserialize)]
pub struct TokenVerifyRequest {
    pub token: String,
}

/// POST /api/token/verify/ - 200 with an empty object for any live token
pub async fn verify_token(
    State(state): State<AppState>,
    Json(request): Json<TokenVerifyRequest>,
) -> Result<impl IntoResponse> {
    state
        .credential_service
        .verify_token(&request.token)
        .await
        .map_err(|_| AppError::AuthenticationFailed)?;

    Ok(Json(json!({})))
}
