use lazy_static::lazy_static;
use regex::Regex;

use super::model::{User, UserField};
use crate::error::AccountError;

pub const MIN_PASSWORD_LEN: usize = 7;
const FORBIDDEN_PASSWORD_FRAGMENT: &str = "password";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        // dot-atom local part, hostname labels, alphabetic TLD
        static ref EMAIL_RE: Regex = Regex::new(
            r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$"
        )
        .unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Field rules checked before every write. The password rules only apply
/// while the field still holds plaintext, i.e. when it is dirty.
pub fn validate(user: &User) -> Result<(), AccountError> {
    if user.name().is_empty() {
        return Err(AccountError::validation("Name is required"));
    }

    if user.email().is_empty() || !is_valid_email(user.email()) {
        return Err(AccountError::validation("Email is invalid"));
    }

    if user.is_dirty(UserField::Password) {
        validate_password(user.password())?;
    }

    Ok(())
}

pub fn validate_password(plain: &str) -> Result<(), AccountError> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if plain.contains(FORBIDDEN_PASSWORD_FRAGMENT) {
        return Err(AccountError::validation("Password is invalid"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::model::NewUser;

    fn user(name: &str, email: &str, password: &str) -> User {
        User::new(NewUser {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            role: None,
        })
    }

    fn message(res: Result<(), AccountError>) -> String {
        match res {
            Err(AccountError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_valid_record() {
        assert!(validate(&user("Ada", "ada@example.com", "rightpass")).is_ok());
    }

    #[test]
    fn email_format() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(is_valid_email("first.last+tag@mail.example.co.uk"));
        assert!(is_valid_email("o'brien@my-host.io"));
        for bad in [
            "a@..com",
            "a..b@x.com",
            ".a@x.com",
            "a.@x.com",
            "a@x.c",
            "a@-x-.com",
            "a@x-.com",
            "a@x..com",
            "a@.x.com",
            "a@x.com.",
            "a@x.c0m",
            "@x.com",
        ] {
            assert!(!is_valid_email(bad), "{bad} should be rejected");
        }
        assert_eq!(
            message(validate(&user("Ada", "not-an-email", "rightpass"))),
            "Email is invalid"
        );
    }

    #[test]
    fn blank_name_is_rejected() {
        assert_eq!(
            message(validate(&user("   ", "a@x.com", "rightpass"))),
            "Name is required"
        );
    }

    #[test]
    fn short_password_is_rejected() {
        assert_eq!(
            message(validate(&user("Ada", "a@x.com", "abc123"))),
            "Password must be at least 7 characters"
        );
        // trimmed before the length check
        assert!(validate(&user("Ada", "a@x.com", "  abc123  ")).is_err());
        assert!(validate(&user("Ada", "a@x.com", "abc1234")).is_ok());
    }

    #[test]
    fn password_containing_password_is_rejected() {
        for bad in ["mypassword1", "password", "xxpasswordxx"] {
            assert_eq!(
                message(validate(&user("Ada", "a@x.com", bad))),
                "Password is invalid"
            );
        }
        // case-sensitive literal check
        assert!(validate(&user("Ada", "a@x.com", "MyPassword1")).is_ok());
    }
}
