use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    accounts::model::{AuthToken, User},
    config::StoreKind,
    error::StoreError,
    posts::model::Post,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence seam for user and post records.
#[async_trait]
pub trait Store: Send + Sync {
    /// Write a record that has never been persisted.
    /// Fails with `StoreError::Duplicate { field: "email" }` on an email clash.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    /// Write the fields `user` has marked dirty; columns it did not touch keep
    /// whatever is stored, so a stale copy cannot undo other writers' changes.
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    /// Atomically append one entry to the stored token list.
    async fn append_token(&self, user_id: Uuid, token: &AuthToken) -> Result<(), StoreError>;

    /// Atomically drop every stored entry equal to `token`.
    async fn remove_token(&self, user_id: Uuid, token: &str) -> Result<(), StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// `email` must already be normalized.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Delete every post authored by `user_id`, then the user itself.
    /// Returns the number of posts removed.
    async fn delete_user_cascade(&self, user_id: Uuid) -> Result<u64, StoreError>;

    async fn insert_post(&self, post: &Post) -> Result<(), StoreError>;

    /// Posts authored by `author_id`, newest first.
    async fn posts_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, StoreError>;
}

impl StoreKind {
    pub async fn connect(&self) -> anyhow::Result<Arc<dyn Store>> {
        let store: Arc<dyn Store> = match self {
            StoreKind::Memory => Arc::new(MemoryStore::new()),
            StoreKind::Postgres { url } => {
                let store = PgStore::connect(url).await?;
                store.migrate().await?;
                Arc::new(store)
            }
        };
        Ok(store)
    }
}
