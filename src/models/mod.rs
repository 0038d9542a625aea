pub mod booking;
pub mod credential;
pub mod role;
pub mod session;
pub mod social_account;
pub mod user;

pub use booking::{Booking, BookingDetail, CreateBookingRequest};
pub use credential::{CredentialPair, StoredToken};
pub use role::{Role, UnknownRole};
pub use session::{CreateSessionRequest, Session, SessionDetail, UpdateSessionRequest};
pub use social_account::SocialAccount;
pub use user::{UpdateProfileRequest, User, UserProfile};

/// Media references are exposed through the `/media/` proxy path.
pub fn media_url(name: &str) -> String {
    format!("/media/{}", name.trim_start_matches('/'))
}
