use crate::models::{Booking, BookingDetail, User, UserProfile};
use crate::repositories::{BookingRepository, RepositoryError, SessionRepository, UserRepository};
use crate::services::session_service::{SessionService, SessionServiceError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum BookingServiceError {
    #[error("Session not found")]
    SessionNotFound,
    #[error("Booking not found")]
    BookingNotFound,
    #[error("You are already enrolled in this session")]
    AlreadyEnrolled,
    #[error("You can only delete your own bookings")]
    NotOwner,
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

impl From<SessionServiceError> for BookingServiceError {
    fn from(err: SessionServiceError) -> Self {
        match err {
            SessionServiceError::NotFound => BookingServiceError::SessionNotFound,
            SessionServiceError::RepositoryError(e) => BookingServiceError::RepositoryError(e),
            // Reads never produce authorization or validation failures
            SessionServiceError::Forbidden(_) | SessionServiceError::Validation(_) => {
                BookingServiceError::SessionNotFound
            }
        }
    }
}

pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    sessions: Arc<dyn SessionRepository>,
    users: Arc<dyn UserRepository>,
    session_service: Arc<SessionService>,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        sessions: Arc<dyn SessionRepository>,
        users: Arc<dyn UserRepository>,
        session_service: Arc<SessionService>,
    ) -> Self {
        Self {
            bookings,
            sessions,
            users,
            session_service,
        }
    }

    /// Enrolls `caller` in a session. At most one booking exists per
    /// (account, session); the lookup gives the friendly error and the
    /// unique index settles concurrent requests.
    pub async fn create(
        &self,
        caller: &User,
        session_id: i64,
    ) -> Result<BookingDetail, BookingServiceError> {
        let session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or(BookingServiceError::SessionNotFound)?;

        if self.bookings.exists_for(caller.id, session.id).await? {
            return Err(BookingServiceError::AlreadyEnrolled);
        }

        let booking = match self.bookings.create(caller.id, session.id).await {
            Ok(booking) => booking,
            Err(RepositoryError::AlreadyExists) => {
                tracing::debug!(
                    "Concurrent booking of session {} by user {} rejected by storage",
                    session.id,
                    caller.id
                );
                return Err(BookingServiceError::AlreadyEnrolled);
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!("User {} booked session {}", caller.id, session.id);

        let session = self.session_service.detail(session).await?;
        Ok(BookingDetail {
            id: booking.id,
            user: UserProfile::from(caller),
            session,
            booked_at: booking.booked_at,
        })
    }

    pub async fn delete(&self, caller: &User, booking_id: i64) -> Result<(), BookingServiceError> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or(BookingServiceError::BookingNotFound)?;

        if booking.user_id != caller.id {
            return Err(BookingServiceError::NotOwner);
        }

        if !self.bookings.delete(booking.id).await? {
            return Err(BookingServiceError::BookingNotFound);
        }
        Ok(())
    }

    pub async fn list_for_user(
        &self,
        caller: &User,
    ) -> Result<Vec<BookingDetail>, BookingServiceError> {
        let bookings = self.bookings.list_by_user(caller.id).await?;
        let profile = UserProfile::from(caller);

        let mut details = Vec::with_capacity(bookings.len());
        for booking in bookings {
            details.push(self.detail(booking, profile.clone()).await?);
        }
        Ok(details)
    }

    pub async fn list_for_session(
        &self,
        session_id: i64,
    ) -> Result<Vec<BookingDetail>, BookingServiceError> {
        if self.sessions.find_by_id(session_id).await?.is_none() {
            return Err(BookingServiceError::SessionNotFound);
        }

        let bookings = self.bookings.list_by_session(session_id).await?;
        let mut details = Vec::with_capacity(bookings.len());
        for booking in bookings {
            // Bookings cascade with their user, so a miss is a concurrent delete
            let Some(user) = self.users.find_by_id(booking.user_id).await? else {
                continue;
            };
            details.push(self.detail(booking, UserProfile::from(user)).await?);
        }
        Ok(details)
    }

    async fn detail(
        &self,
        booking: Booking,
        user: UserProfile,
    ) -> Result<BookingDetail, BookingServiceError> {
        let session = self
            .sessions
            .find_by_id(booking.session_id)
            .await?
            .ok_or(BookingServiceError::SessionNotFound)?;
        let session = self.session_service.detail(session).await?;
        Ok(BookingDetail {
            id: booking.id,
            user,
            session,
            booked_at: booking.booked_at,
        })
    }
}
