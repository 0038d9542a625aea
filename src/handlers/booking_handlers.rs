use crate::auth::AuthUser;
use crate::error::Result;
use crate::models::{BookingDetail, CreateBookingRequest};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

/// POST /api/bookings/create/
///
/// 409 when the caller already holds a booking for the session.
pub async fn create_booking(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse> {
    let booking = state
        .booking_service
        .create(&user, request.session_id)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// DELETE /api/bookings/{id}/delete/
pub async fn delete_booking(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.booking_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/bookings/my/
pub async fn my_bookings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<BookingDetail>>> {
    Ok(Json(state.booking_service.list_for_user(&user).await?))
}
