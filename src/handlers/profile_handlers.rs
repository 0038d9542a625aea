use crate::auth::AuthUser;
use crate::error::Result;
use crate::models::{UpdateProfileRequest, UserProfile};
use crate::AppState;
use axum::{extract::State, Json};

/// GET /api/users/me/
pub async fn get_profile(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(user))
}

/// PATCH /api/users/me/ - Partial update; omitted fields keep their value
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>> {
    let updated = state.user_service.update_profile(user.id, request).await?;
    Ok(Json(UserProfile::from(updated)))
}
