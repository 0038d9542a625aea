use crate::auth::AuthUser;
use crate::error::Result;
use crate::models::{BookingDetail, CreateSessionRequest, SessionDetail, UpdateSessionRequest};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SessionFilter {
    pub creator: Option<i64>,
}

/// GET /api/sessions/?creator=<id> - Newest first
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(filter): Query<SessionFilter>,
) -> Result<Json<Vec<SessionDetail>>> {
    let sessions = match filter.creator {
        Some(creator_id) => state.session_service.list_by_creator(creator_id).await?,
        None => state.session_service.list().await?,
    };
    Ok(Json(sessions))
}

/// GET /api/sessions/{id}/
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SessionDetail>> {
    Ok(Json(state.session_service.get(id).await?))
}

/// GET /api/sessions/{id}/bookings/
pub async fn list_session_bookings(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<BookingDetail>>> {
    Ok(Json(state.booking_service.list_for_session(id).await?))
}

/// POST /api/sessions/create/ - Creators only; the caller becomes the owner
pub async fn create_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse> {
    let session = state.session_service.create(&user, request).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// PUT/PATCH /api/sessions/{id}/update/
pub async fn update_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateSessionRequest>,
) -> Result<Json<SessionDetail>> {
    Ok(Json(state.session_service.update(&user, id, request).await?))
}

/// DELETE /api/sessions/{id}/delete/
pub async fn delete_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.session_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
