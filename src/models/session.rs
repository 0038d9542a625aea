use super::{media_url, UserProfile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A bookable offering published by a creator.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub creator_id: i64,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub price: f64,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetail {
    pub id: i64,
    pub creator: UserProfile,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub price: f64,
    pub image: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionDetail {
    pub fn new(session: Session, creator: UserProfile) -> Self {
        let image_url = session.image.as_deref().map(media_url);
        Self {
            id: session.id,
            creator,
            title: session.title,
            description: session.description,
            date: session.date,
            price: session.price,
            image: session.image,
            image_url,
            created_at: session.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub price: f64,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSessionRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub price: Option<f64>,
    pub image: Option<String>,
}
