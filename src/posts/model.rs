use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Blog post. `author_id` is a lookup key only; users do not hold their posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Post {
    pub fn new(author_id: Uuid, title: &str, body: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            title: title.trim().to_string(),
            body: body.to_string(),
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub body: String,
}
