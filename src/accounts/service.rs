use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    hooks::{default_hooks, run_hooks, PrePersistHook},
    model::{AuthToken, NewUser, User},
    validation::validate,
};
use crate::{
    auth::jwt::JwtKeys,
    error::{AccountError, LOGIN_FAILED, NOT_AUTHENTICATED},
    posts::model::Post,
    storage::Store,
};

/// Account record manager: validation, hashing, token issue and cascade delete
/// on top of a `Store`.
pub struct Accounts {
    store: Arc<dyn Store>,
    keys: JwtKeys,
    hooks: Vec<Box<dyn PrePersistHook>>,
}

impl Accounts {
    pub fn new(store: Arc<dyn Store>, keys: JwtKeys) -> Self {
        Self {
            store,
            keys,
            hooks: default_hooks(),
        }
    }

    pub fn with_hooks(mut self, hooks: Vec<Box<dyn PrePersistHook>>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    #[instrument(skip_all)]
    pub async fn create(&self, input: NewUser) -> Result<User, AccountError> {
        let mut user = User::new(input);
        self.save(&mut user).await?;
        info!(user_id = %user.id(), email = %user.email(), "user created");
        Ok(user)
    }

    /// Validate, run hooks for dirty fields, write, mark clean.
    /// On failure the record keeps its dirty set, so a retry re-runs the hooks.
    #[instrument(skip_all, fields(user_id = %user.id()))]
    pub async fn save(&self, user: &mut User) -> Result<(), AccountError> {
        validate(user)?;

        let mut staged = user.clone();
        run_hooks(&self.hooks, &mut staged)?;

        if staged.is_persisted() {
            self.store.update_user(&staged).await?;
        } else {
            self.store.insert_user(&staged).await?;
        }

        staged.mark_persisted();
        *user = staged;
        debug!("user saved");
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AccountError> {
        Ok(self.store.find_user_by_id(id).await?)
    }

    /// Same error for unknown email and wrong password.
    #[instrument(skip_all)]
    pub async fn find_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, AccountError> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            warn!(email = %email, "login unknown email");
            return Err(AccountError::Auth(LOGIN_FAILED));
        };
        if !user.check_password(password) {
            warn!(user_id = %user.id(), "login invalid password");
            return Err(AccountError::Auth(LOGIN_FAILED));
        }
        Ok(user)
    }

    /// Sign a token for `user`, append it to the stored token list and mirror
    /// it on `user`. Pending changes on `user` are saved first.
    #[instrument(skip_all, fields(user_id = %user.id()))]
    pub async fn generate_auth_token(&self, user: &mut User) -> Result<String, AccountError> {
        if !user.is_persisted() || user.dirty_fields().next().is_some() {
            self.save(user).await?;
        }
        let token = self.keys.sign(user.id())?;
        let entry = AuthToken {
            token: token.clone(),
        };
        self.store.append_token(user.id(), &entry).await?;
        user.record_token(entry);
        Ok(token)
    }

    /// Resolve a bearer token to its user. The token must verify and still be
    /// listed on the record.
    pub async fn authenticate(&self, token: &str) -> Result<User, AccountError> {
        let claims = self.keys.verify(token).map_err(|e| {
            debug!(error = %e, "token rejected");
            AccountError::Auth(NOT_AUTHENTICATED)
        })?;
        match self.store.find_user_by_id(claims.sub).await? {
            Some(user) if user.has_token(token) => Ok(user),
            _ => {
                warn!(user_id = %claims.sub, "token not issued to a live user");
                Err(AccountError::Auth(NOT_AUTHENTICATED))
            }
        }
    }

    pub async fn revoke_token(&self, user: &mut User, token: &str) -> Result<(), AccountError> {
        self.store.remove_token(user.id(), token).await?;
        user.forget_token(token);
        Ok(())
    }

    pub async fn revoke_all_tokens(&self, user: &mut User) -> Result<(), AccountError> {
        user.clear_tokens();
        self.save(user).await
    }

    /// Remove the user's posts, then the user.
    #[instrument(skip_all, fields(user_id = %user.id()))]
    pub async fn delete_user(&self, user: User) -> Result<u64, AccountError> {
        let posts = self.store.delete_user_cascade(user.id()).await?;
        info!(posts, "user deleted");
        Ok(posts)
    }

    pub async fn posts_of(&self, user_id: Uuid) -> Result<Vec<Post>, AccountError> {
        Ok(self.store.posts_by_author(user_id).await?)
    }

    pub async fn create_post(
        &self,
        author_id: Uuid,
        title: &str,
        body: &str,
    ) -> Result<Post, AccountError> {
        let post = Post::new(author_id, title, body);
        if post.title.is_empty() {
            return Err(AccountError::validation("Title is required"));
        }
        self.store.insert_post(&post).await?;
        debug!(post_id = %post.id, %author_id, "post created");
        Ok(post)
    }
}
