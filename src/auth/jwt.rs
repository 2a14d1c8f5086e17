use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::Claims;
use crate::{config::JwtConfig, error::AccountError};

/// Signing and verification keys, built once from the process-wide secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Option<Duration>,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: cfg
                .ttl_minutes
                .filter(|m| *m > 0)
                .and_then(|m| u64::try_from(m).ok())
                .map(|m| Duration::from_secs(m.saturating_mul(60))),
        }
    }
}

impl JwtKeys {
    pub fn sign(&self, user_id: Uuid) -> Result<String, AccountError> {
        let now = OffsetDateTime::now_utc();
        let exp = match self.ttl {
            Some(ttl) => Some(expiry_after(now, ttl)?),
            None => None,
        };
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            jti: Uuid::new_v4(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AccountError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        if self.ttl.is_none() {
            validation.required_spec_claims.remove("exp");
            validation.validate_exp = false;
        }
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

fn expiry_after(now: OffsetDateTime, ttl: Duration) -> Result<usize, AccountError> {
    let secs = i64::try_from(ttl.as_secs()).map_err(|_| AccountError::TokenExpiry)?;
    let exp = now
        .checked_add(TimeDuration::seconds(secs))
        .ok_or(AccountError::TokenExpiry)?;
    usize::try_from(exp.unix_timestamp()).map_err(|_| AccountError::TokenExpiry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str, ttl_minutes: Option<i64>) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes,
        })
    }

    #[test]
    fn sign_and_verify_without_expiry() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud", None);
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert!(claims.exp.is_none());
    }

    #[test]
    fn sign_with_ttl_embeds_expiry() {
        let keys = make_keys("dev-secret", "iss", "aud", Some(5));
        let token = keys.sign(Uuid::new_v4()).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        let exp = claims.exp.expect("exp present");
        assert_eq!(exp - claims.iat, 300);
    }

    #[test]
    fn huge_ttl_is_an_error_not_a_panic() {
        let keys = make_keys("dev-secret", "iss", "aud", Some(i64::MAX));
        assert!(matches!(keys.sign(Uuid::new_v4()), Err(AccountError::TokenExpiry)));
    }

    #[test]
    fn non_positive_ttl_is_treated_as_unset() {
        for minutes in [0, -5] {
            let keys = make_keys("dev-secret", "iss", "aud", Some(minutes));
            let token = keys.sign(Uuid::new_v4()).unwrap();
            assert!(keys.verify(&token).unwrap().exp.is_none());
        }
    }

    #[test]
    fn tokens_signed_back_to_back_differ() {
        let keys = make_keys("dev-secret", "iss", "aud", None);
        let user_id = Uuid::new_v4();
        let a = keys.sign(user_id).unwrap();
        let b = keys.sign(user_id).unwrap();
        assert_ne!(a, b);
        assert_eq!(keys.verify(&a).unwrap().sub, keys.verify(&b).unwrap().sub);
    }

    #[test]
    fn verify_rejects_wrong_secret_or_audience() {
        let good = make_keys("same-secret", "iss", "good-aud", None);
        let other_aud = make_keys("same-secret", "iss", "bad-aud", None);
        let other_secret = make_keys("other-secret", "iss", "good-aud", None);
        let token = good.sign(Uuid::new_v4()).unwrap();
        assert!(other_aud.verify(&token).is_err());
        assert!(other_secret.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_garbage() {
        let keys = make_keys("dev-secret", "iss", "aud", None);
        assert!(matches!(keys.verify("not.a.jwt"), Err(AccountError::Token(_))));
    }
}
