use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::Store;
use crate::{
    accounts::model::{AuthToken, User, UserField},
    error::StoreError,
    posts::model::Post,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    posts: HashMap<Uuid, Post>,
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        debug!("creating in-memory store");
        Self::default()
    }
}

fn snapshot(user: &User) -> User {
    let mut stored = user.clone();
    stored.mark_persisted();
    stored
}

fn stored_mut(tables: &mut Tables, id: Uuid) -> Result<&mut User, StoreError> {
    tables
        .users
        .get_mut(&id)
        .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
}

fn email_taken(tables: &Tables, email: &str, except: Uuid) -> bool {
    tables
        .users
        .values()
        .any(|u| u.id() != except && u.email() == email)
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.id()) {
            return Err(StoreError::Duplicate { field: "id" });
        }
        if email_taken(&tables, user.email(), user.id()) {
            return Err(StoreError::Duplicate { field: "email" });
        }
        tables.users.insert(user.id(), snapshot(user));
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if user.is_dirty(UserField::Email) && email_taken(&tables, user.email(), user.id()) {
            return Err(StoreError::Duplicate { field: "email" });
        }
        let stored = stored_mut(&mut tables, user.id())?;
        for field in user.dirty_fields() {
            stored.copy_field(user, field);
        }
        Ok(())
    }

    async fn append_token(&self, user_id: Uuid, token: &AuthToken) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        stored_mut(&mut tables, user_id)?.record_token(token.clone());
        Ok(())
    }

    async fn remove_token(&self, user_id: Uuid, token: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        stored_mut(&mut tables, user_id)?.forget_token(token);
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email() == email).cloned())
    }

    async fn delete_user_cascade(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.posts.len();
        tables.posts.retain(|_, p| p.author_id != user_id);
        let removed = (before - tables.posts.len()) as u64;
        tables.users.remove(&user_id);
        Ok(removed)
    }

    async fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.posts.contains_key(&post.id) {
            return Err(StoreError::Duplicate { field: "id" });
        }
        tables.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn posts_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, StoreError> {
        let tables = self.tables.read().await;
        let mut posts: Vec<Post> = tables
            .posts
            .values()
            .filter(|p| p.author_id == author_id)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::model::NewUser;

    fn user(email: &str) -> User {
        User::new(NewUser {
            name: "Ada".into(),
            email: email.into(),
            password: "hash-placeholder".into(),
            role: None,
        })
    }

    #[tokio::test]
    async fn stored_copies_come_back_clean() {
        let store = MemoryStore::new();
        let u = user("a@x.com");
        store.insert_user(&u).await.unwrap();

        let loaded = store.find_user_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(loaded.id(), u.id());
        assert!(loaded.is_persisted());
        assert_eq!(loaded.dirty_fields().count(), 0);
    }

    #[tokio::test]
    async fn update_writes_only_dirty_fields() {
        let store = MemoryStore::new();
        let u = user("a@x.com");
        store.insert_user(&u).await.unwrap();

        let mut stale = store.find_user_by_id(u.id()).await.unwrap().unwrap();
        store
            .append_token(u.id(), &AuthToken { token: "t1".into() })
            .await
            .unwrap();

        stale.set_name("Grace");
        store.update_user(&stale).await.unwrap();

        let stored = store.find_user_by_id(u.id()).await.unwrap().unwrap();
        assert_eq!(stored.name(), "Grace");
        assert!(stored.has_token("t1"));
        assert_eq!(stored.dirty_fields().count(), 0);
    }

    #[tokio::test]
    async fn token_list_edits_keep_order() {
        let store = MemoryStore::new();
        let u = user("a@x.com");
        store.insert_user(&u).await.unwrap();
        for t in ["t1", "t2", "t3"] {
            store
                .append_token(u.id(), &AuthToken { token: t.into() })
                .await
                .unwrap();
        }
        store.remove_token(u.id(), "t2").await.unwrap();

        let stored = store.find_user_by_id(u.id()).await.unwrap().unwrap();
        let tokens: Vec<_> = stored.tokens().iter().map(|t| t.token.as_str()).collect();
        assert_eq!(tokens, ["t1", "t3"]);

        let missing = store
            .append_token(Uuid::new_v4(), &AuthToken { token: "x".into() })
            .await
            .unwrap_err();
        assert!(matches!(missing, StoreError::Database(sqlx::Error::RowNotFound)));
    }

    #[tokio::test]
    async fn email_is_unique() {
        let store = MemoryStore::new();
        store.insert_user(&user("a@x.com")).await.unwrap();
        let err = store.insert_user(&user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { field: "email" }));
    }

    #[tokio::test]
    async fn cascade_only_touches_the_authors_posts() {
        let store = MemoryStore::new();
        let ada = user("ada@x.com");
        let bob = user("bob@x.com");
        store.insert_user(&ada).await.unwrap();
        store.insert_user(&bob).await.unwrap();
        store.insert_post(&Post::new(ada.id(), "one", "")).await.unwrap();
        store.insert_post(&Post::new(ada.id(), "two", "")).await.unwrap();
        store.insert_post(&Post::new(bob.id(), "bob's", "")).await.unwrap();

        assert_eq!(store.delete_user_cascade(ada.id()).await.unwrap(), 2);
        assert!(store.find_user_by_id(ada.id()).await.unwrap().is_none());
        assert!(store.posts_by_author(ada.id()).await.unwrap().is_empty());
        assert_eq!(store.posts_by_author(bob.id()).await.unwrap().len(), 1);
    }
}
