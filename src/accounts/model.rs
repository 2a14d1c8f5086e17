use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::auth::password::verify_password;

/// Mutable fields of a user record, used as dirty-tracking and hook keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UserField {
    Name,
    Email,
    Password,
    Role,
    Tokens,
    Avatar,
}

impl UserField {
    pub const ALL: [UserField; 6] = [
        UserField::Name,
        UserField::Email,
        UserField::Password,
        UserField::Role,
        UserField::Tokens,
        UserField::Avatar,
    ];
}

/// One issued session token, stored as `{"token": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
}

/// Input for registering a user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// A user record. Fields are only reachable through setters so every change
/// is recorded and the matching pre-persist hooks run on the next save.
#[derive(Debug, Clone)]
pub struct User {
    id: Uuid,
    name: String,
    email: String,
    password: String,
    role: Option<String>,
    tokens: Vec<AuthToken>,
    avatar: Option<Vec<u8>>,
    created_at: OffsetDateTime,
    dirty: BTreeSet<UserField>,
    persisted: bool,
}

impl User {
    /// Unsaved record; every field starts dirty.
    pub fn new(input: NewUser) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: normalize_name(&input.name),
            email: normalize_email(&input.email),
            password: normalize_password(&input.password),
            role: input.role,
            tokens: Vec::new(),
            avatar: None,
            created_at: OffsetDateTime::now_utc(),
            dirty: UserField::ALL.into_iter().collect(),
            persisted: false,
        }
    }

    /// Rebuild a record read back from storage. `password` must be the stored hash.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_stored(
        id: Uuid,
        name: String,
        email: String,
        password: String,
        role: Option<String>,
        tokens: Vec<AuthToken>,
        avatar: Option<Vec<u8>>,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            name,
            email,
            password,
            role,
            tokens,
            avatar,
            created_at,
            dirty: BTreeSet::new(),
            persisted: true,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// The stored hash once persisted; plaintext while the field is dirty.
    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn tokens(&self) -> &[AuthToken] {
        &self.tokens
    }

    pub fn avatar(&self) -> Option<&[u8]> {
        self.avatar.as_deref()
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn is_dirty(&self, field: UserField) -> bool {
        self.dirty.contains(&field)
    }

    pub fn dirty_fields(&self) -> impl Iterator<Item = UserField> + '_ {
        self.dirty.iter().copied()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = normalize_name(name);
        self.dirty.insert(UserField::Name);
    }

    pub fn set_email(&mut self, email: &str) {
        self.email = normalize_email(email);
        self.dirty.insert(UserField::Email);
    }

    pub fn set_password(&mut self, plain: &str) {
        self.password = normalize_password(plain);
        self.dirty.insert(UserField::Password);
    }

    pub fn set_role(&mut self, role: Option<String>) {
        self.role = role;
        self.dirty.insert(UserField::Role);
    }

    pub fn set_avatar(&mut self, avatar: Option<Vec<u8>>) {
        self.avatar = avatar;
        self.dirty.insert(UserField::Avatar);
    }

    pub fn push_token(&mut self, token: String) {
        self.tokens.push(AuthToken { token });
        self.dirty.insert(UserField::Tokens);
    }

    /// Drops every entry equal to `token`; returns how many were removed.
    pub fn remove_token(&mut self, token: &str) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|t| t.token != token);
        let removed = before - self.tokens.len();
        if removed > 0 {
            self.dirty.insert(UserField::Tokens);
        }
        removed
    }

    pub fn clear_tokens(&mut self) {
        self.tokens.clear();
        self.dirty.insert(UserField::Tokens);
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t.token == token)
    }

    /// Mirror a token the store already appended; leaves the field clean.
    pub(crate) fn record_token(&mut self, token: AuthToken) {
        self.tokens.push(token);
    }

    /// Mirror a token removal the store already applied; leaves the field clean.
    pub(crate) fn forget_token(&mut self, token: &str) {
        self.tokens.retain(|t| t.token != token);
    }

    /// Copy one field's value from `other`, used to apply a partial update.
    pub(crate) fn copy_field(&mut self, other: &User, field: UserField) {
        match field {
            UserField::Name => self.name = other.name.clone(),
            UserField::Email => self.email = other.email.clone(),
            UserField::Password => self.password = other.password.clone(),
            UserField::Role => self.role = other.role.clone(),
            UserField::Tokens => self.tokens = other.tokens.clone(),
            UserField::Avatar => self.avatar = other.avatar.clone(),
        }
    }

    /// Replace the plaintext password with its hash without marking anything dirty.
    pub(crate) fn replace_password_hash(&mut self, hash: String) {
        self.password = hash;
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.dirty.clear();
        self.persisted = true;
    }

    /// Compare a candidate plaintext against the stored hash.
    /// A malformed stored hash counts as a mismatch.
    pub fn check_password(&self, candidate: &str) -> bool {
        match verify_password(candidate, &self.password) {
            Ok(ok) => ok,
            Err(e) => {
                warn!(user_id = %self.id, error = %e, "stored password hash unreadable");
                false
            }
        }
    }

    /// Representation safe to hand to clients: no password, no tokens.
    pub fn to_safe_view(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            avatar: self.avatar.clone().map(ByteBuf::from),
            created_at: self.created_at,
        }
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Option<String>,
    pub avatar: Option<ByteBuf>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

fn normalize_name(name: &str) -> String {
    name.trim().to_string()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn normalize_password(password: &str) -> String {
    password.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;

    fn sample() -> NewUser {
        NewUser {
            name: "  Ada  ".into(),
            email: "  Ada@Example.COM ".into(),
            password: " rightpass ".into(),
            role: Some("admin".into()),
        }
    }

    fn stored(password_hash: String) -> User {
        User::from_stored(
            Uuid::new_v4(),
            "Ada".into(),
            "ada@example.com".into(),
            password_hash,
            Some("admin".into()),
            vec![AuthToken { token: "t1".into() }],
            Some(vec![1, 2, 3]),
            OffsetDateTime::now_utc(),
        )
    }

    #[test]
    fn new_user_is_normalized_and_fully_dirty() {
        let user = User::new(sample());
        assert_eq!(user.name(), "Ada");
        assert_eq!(user.email(), "ada@example.com");
        assert_eq!(user.password(), "rightpass");
        assert!(!user.is_persisted());
        for field in UserField::ALL {
            assert!(user.is_dirty(field), "{field:?} should be dirty");
        }
    }

    #[test]
    fn stored_user_is_clean_until_a_setter_runs() {
        let mut user = stored("hash".into());
        assert_eq!(user.dirty_fields().count(), 0);

        user.set_role(None);
        assert!(user.is_dirty(UserField::Role));
        assert!(!user.is_dirty(UserField::Password));

        user.set_password("newsecret");
        assert!(user.is_dirty(UserField::Password));
    }

    #[test]
    fn tokens_append_in_order_and_keep_duplicates() {
        let mut user = stored("hash".into());
        user.push_token("t2".into());
        user.push_token("t2".into());
        let tokens: Vec<_> = user.tokens().iter().map(|t| t.token.as_str()).collect();
        assert_eq!(tokens, ["t1", "t2", "t2"]);
        assert!(user.is_dirty(UserField::Tokens));
    }

    #[test]
    fn remove_token_only_marks_dirty_when_something_changed() {
        let mut user = stored("hash".into());
        assert_eq!(user.remove_token("missing"), 0);
        assert!(!user.is_dirty(UserField::Tokens));
        assert_eq!(user.remove_token("t1"), 1);
        assert!(user.tokens().is_empty());
        assert!(user.is_dirty(UserField::Tokens));
    }

    #[test]
    fn check_password_against_stored_hash() {
        let user = stored(hash_password("rightpass").unwrap());
        assert!(user.check_password("rightpass"));
        assert!(!user.check_password("wrongpass"));
    }

    #[test]
    fn check_password_is_false_for_malformed_hash() {
        let user = stored("not-a-phc-string".into());
        assert!(!user.check_password("anything"));
    }

    #[test]
    fn safe_view_drops_password_and_tokens() {
        let user = stored(hash_password("rightpass").unwrap());
        let json = serde_json::to_value(user.to_safe_view()).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("password"));
        assert!(!obj.contains_key("tokens"));
        assert_eq!(obj["name"], "Ada");
        assert_eq!(obj["email"], "ada@example.com");
        assert_eq!(obj["role"], "admin");
        assert_eq!(obj["id"], user.id().to_string());
        assert!(obj.contains_key("avatar"));
    }
}
