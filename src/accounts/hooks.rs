use tracing::debug;

use super::model::{User, UserField};
use crate::{auth::password::hash_password, error::AccountError};

/// Transform applied to a record right before it is written, but only when
/// the field it is keyed on has changed since the last load or save.
pub trait PrePersistHook: Send + Sync {
    fn field(&self) -> UserField;
    fn apply(&self, user: &mut User) -> Result<(), AccountError>;
}

/// Replaces a freshly set plaintext password with its salted hash.
pub struct HashPassword;

impl PrePersistHook for HashPassword {
    fn field(&self) -> UserField {
        UserField::Password
    }

    fn apply(&self, user: &mut User) -> Result<(), AccountError> {
        let hash = hash_password(user.password())?;
        user.replace_password_hash(hash);
        debug!(user_id = %user.id(), "password hashed");
        Ok(())
    }
}

pub fn default_hooks() -> Vec<Box<dyn PrePersistHook>> {
    vec![Box::new(HashPassword)]
}

/// Run every hook whose field is dirty, in registration order.
pub fn run_hooks(hooks: &[Box<dyn PrePersistHook>], user: &mut User) -> Result<(), AccountError> {
    for hook in hooks {
        if user.is_dirty(hook.field()) {
            hook.apply(user)?;
        }
    }
    Ok(())
}
