pub mod auth_handlers;
pub mod booking_handlers;
pub mod oauth_handlers;
pub mod profile_handlers;
pub mod session_handlers;

pub use auth_handlers::{obtain_token, refresh_token, register, set_role, verify_token};
pub use booking_handlers::{create_booking, delete_booking, my_bookings};
pub use oauth_handlers::{provider_callback, provider_login};
pub use profile_handlers::{get_profile, update_profile};
pub use session_handlers::{
    create_session, delete_session, get_session, list_session_bookings, list_sessions,
    update_session,
};

use axum::Json;
use serde_json::{json, Value};

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
