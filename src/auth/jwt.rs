use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, state::AppState};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token rejected: {0}")]
    Invalid(jsonwebtoken::errors::Error),
    #[error("token expired")]
    Expired,
    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

/// JWT payload. `exp` is absolute, in unix seconds.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// HS256 signing and verification keys derived from the server secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::hours(cfg.ttl_hours),
        }
    }

    /// Issues a token for `user_id` expiring `ttl` after `now`.
    pub fn issue(&self, user_id: Uuid, now: OffsetDateTime) -> Result<String, TokenError> {
        let exp = now + self.ttl;
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token =
            encode(&Header::default(), &claims, &self.encoding).map_err(TokenError::Signing)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    /// Checks signature, issuer and audience, then expiry against `now`.
    /// A token is expired from the instant `now >= exp`.
    pub fn validate(&self, token: &str, now: OffsetDateTime) -> Result<Uuid, TokenError> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        // Expiry is checked below against the caller's clock, without leeway.
        validation.validate_exp = false;

        let data =
            decode::<Claims>(token, &self.decoding, &validation).map_err(TokenError::Invalid)?;
        if now.unix_timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_hours: 72,
        })
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    #[test]
    fn issued_token_validates_immediately() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user_id = Uuid::new_v4();
        let issued_at = now();
        let token = keys.issue(user_id, issued_at).expect("sign");
        let sub = keys.validate(&token, issued_at).expect("validate");
        assert_eq!(sub, user_id);
    }

    #[test]
    fn token_expires_after_72_hours() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let issued_at = now();
        let token = keys.issue(Uuid::new_v4(), issued_at).expect("sign");

        let just_before = issued_at + Duration::hours(72) - Duration::seconds(1);
        assert!(keys.validate(&token, just_before).is_ok());

        let at_expiry = issued_at + Duration::hours(72);
        assert!(matches!(
            keys.validate(&token, at_expiry),
            Err(TokenError::Expired)
        ));

        let later = issued_at + Duration::hours(73);
        assert!(matches!(keys.validate(&token, later), Err(TokenError::Expired)));
    }

    #[test]
    fn token_from_other_secret_is_invalid() {
        let good = make_keys("secret-a", "iss", "aud");
        let other = make_keys("secret-b", "iss", "aud");
        let token = other.issue(Uuid::new_v4(), now()).expect("sign");
        assert!(matches!(good.validate(&token, now()), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn tampered_payload_is_invalid() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys.issue(Uuid::new_v4(), now()).expect("sign");
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let forged = keys.issue(Uuid::new_v4(), now()).expect("sign");
        parts[1] = forged.split('.').nth(1).unwrap().to_string();
        let tampered = parts.join(".");
        assert!(matches!(
            keys.validate(&tampered, now()),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn garbage_is_invalid() {
        let keys = make_keys("dev-secret", "iss", "aud");
        assert!(matches!(
            keys.validate("not.a.jwt", now()),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn wrong_issuer_or_audience_is_invalid() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let bad = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good.issue(Uuid::new_v4(), now()).expect("sign");
        assert!(bad.validate(&token, now()).is_err());
    }
}
