use crate::models::{
    CreateSessionRequest, Role, Session, SessionDetail, UpdateSessionRequest, User, UserProfile,
};
use crate::repositories::{RepositoryError, SessionRepository, UserRepository};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SessionServiceError {
    #[error("Session not found")]
    NotFound,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

#[derive(Clone, Copy)]
enum Change {
    Update,
    Delete,
}

impl Change {
    fn creator_only(self) -> &'static str {
        match self {
            Change::Update => "Only creators can update sessions",
            Change::Delete => "Only creators can delete sessions",
        }
    }

    fn owner_only(self) -> &'static str {
        match self {
            Change::Update => "You can only update your own sessions",
            Change::Delete => "You can only delete your own sessions",
        }
    }
}

pub struct SessionService {
    sessions: Arc<dyn SessionRepository>,
    users: Arc<dyn UserRepository>,
}

impl SessionService {
    pub fn new(sessions: Arc<dyn SessionRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { sessions, users }
    }

    pub async fn list(&self) -> Result<Vec<SessionDetail>, SessionServiceError> {
        let sessions = self.sessions.list_all().await?;
        self.with_creators(sessions).await
    }

    pub async fn list_by_creator(
        &self,
        creator_id: i64,
    ) -> Result<Vec<SessionDetail>, SessionServiceError> {
        let sessions = self.sessions.list_by_creator(creator_id).await?;
        self.with_creators(sessions).await
    }

    pub async fn get(&self, id: i64) -> Result<SessionDetail, SessionServiceError> {
        let session = self
            .sessions
            .find_by_id(id)
            .await?
            .ok_or(SessionServiceError::NotFound)?;
        self.detail(session).await
    }

    pub async fn create(
        &self,
        caller: &User,
        request: CreateSessionRequest,
    ) -> Result<SessionDetail, SessionServiceError> {
        if caller.role != Some(Role::Creator) {
            return Err(SessionServiceError::Forbidden(
                "Only creators can create sessions",
            ));
        }

        validate_title(&request.title)?;
        validate_price(request.price)?;

        let session = self.sessions.create(caller.id, request).await?;
        tracing::info!("User {} created session {}", caller.id, session.id);
        Ok(SessionDetail::new(session, UserProfile::from(caller)))
    }

    pub async fn update(
        &self,
        caller: &User,
        id: i64,
        request: UpdateSessionRequest,
    ) -> Result<SessionDetail, SessionServiceError> {
        let existing = self.owned_session(caller, id, Change::Update).await?;

        if let Some(ref title) = request.title {
            validate_title(title)?;
        }
        if let Some(price) = request.price {
            validate_price(price)?;
        }

        let session = self
            .sessions
            .update(existing.id, request)
            .await?
            .ok_or(SessionServiceError::NotFound)?;
        Ok(SessionDetail::new(session, UserProfile::from(caller)))
    }

    pub async fn delete(&self, caller: &User, id: i64) -> Result<(), SessionServiceError> {
        let existing = self.owned_session(caller, id, Change::Delete).await?;

        if !self.sessions.delete(existing.id).await? {
            return Err(SessionServiceError::NotFound);
        }
        tracing::info!("User {} deleted session {}", caller.id, existing.id);
        Ok(())
    }

    /// Loads a session the caller may modify: they must be a creator and
    /// must own it.
    async fn owned_session(
        &self,
        caller: &User,
        id: i64,
        change: Change,
    ) -> Result<Session, SessionServiceError> {
        if caller.role != Some(Role::Creator) {
            return Err(SessionServiceError::Forbidden(change.creator_only()));
        }

        let session = self
            .sessions
            .find_by_id(id)
            .await?
            .ok_or(SessionServiceError::NotFound)?;

        if session.creator_id != caller.id {
            return Err(SessionServiceError::Forbidden(change.owner_only()));
        }

        Ok(session)
    }

    pub(crate) async fn detail(
        &self,
        session: Session,
    ) -> Result<SessionDetail, SessionServiceError> {
        let creator = self
            .users
            .find_by_id(session.creator_id)
            .await?
            .ok_or(SessionServiceError::RepositoryError(RepositoryError::NotFound))?;
        Ok(SessionDetail::new(session, UserProfile::from(creator)))
    }

    async fn with_creators(
        &self,
        sessions: Vec<Session>,
    ) -> Result<Vec<SessionDetail>, SessionServiceError> {
        let mut details = Vec::with_capacity(sessions.len());
        for session in sessions {
            details.push(self.detail(session).await?);
        }
        Ok(details)
    }
}

fn validate_title(title: &str) -> Result<(), SessionServiceError> {
    if title.trim().is_empty() {
        return Err(SessionServiceError::Validation(
            "Title must not be empty".to_string(),
        ));
    }
    if title.chars().count() > 255 {
        return Err(SessionServiceError::Validation(
            "Title must be at most 255 characters".to_string(),
        ));
    }
    Ok(())
}

/// Prices are stored to the cent, at most eight digits in total.
const MAX_PRICE: f64 = 999_999.99;

fn validate_price(price: f64) -> Result<(), SessionServiceError> {
    if !price.is_finite() || price < 0.0 {
        return Err(SessionServiceError::Validation(
            "Price must be a non-negative number".to_string(),
        ));
    }
    if price > MAX_PRICE {
        return Err(SessionServiceError::Validation(format!(
            "Price must be at most {:.2}",
            MAX_PRICE
        )));
    }
    let cents = price * 100.0;
    if (cents - cents.round()).abs() > 1e-6 {
        return Err(SessionServiceError::Validation(
            "Price must have at most 2 decimal places".to_string(),
        ));
    }
    Ok(())
}
