//! HS256 JSON Web Token authenticator

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::domain::User;
use crate::ports::Authenticator;

/// Claims carried by every issued token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Signs and verifies tokens with a shared secret
pub struct JwtAuthenticator {
    secret: String,
    ttl: Duration,
}

impl JwtAuthenticator {
    /// `ttl_hours` must be positive and representable as a duration
    pub fn new(secret: impl Into<String>, ttl_hours: i64) -> Result<Self> {
        if ttl_hours < 1 {
            return Err(Error::Config(format!(
                "Token lifetime must be at least one hour, got {}",
                ttl_hours
            )));
        }
        let ttl = Duration::try_hours(ttl_hours).ok_or_else(|| {
            Error::Config(format!("Token lifetime of {} hours is out of range", ttl_hours))
        })?;
        Ok(Self {
            secret: secret.into(),
            ttl,
        })
    }

    /// Decode and validate a token, returning its claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| Error::Unauthenticated(format!("Invalid or expired token: {}", e)))?;
        Ok(data.claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| Error::Config(format!("Failed to sign token: {}", e)))
    }
}

impl Authenticator for JwtAuthenticator {
    fn issue_token(&self, user: &User) -> Result<String> {
        let expires_at = Utc::now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| Error::Config("Token expiry is out of range".to_string()))?;
        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            exp: expires_at.timestamp(),
        };
        self.sign(&claims)
    }

    fn current_user_id(&self, token: &str) -> Result<i64> {
        Ok(self.verify(token)?.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_which_is_long_enough_for_hs256_signing";

    fn user() -> User {
        User {
            id: 42,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            full_name: "Alice".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let auth = JwtAuthenticator::new(SECRET, 72).unwrap();
        let token = auth.issue_token(&user()).unwrap();

        assert_eq!(auth.current_user_id(&token).unwrap(), 42);
        let claims = auth.verify(&token).unwrap();
        assert_eq!(claims.username, "alice");
        assert!(claims.exp > Utc::now().timestamp() + 71 * 3600);
    }

    #[test]
    fn test_rejects_foreign_secret() {
        let issuer = JwtAuthenticator::new("another_secret_of_reasonable_length_000000", 72).unwrap();
        let token = issuer.issue_token(&user()).unwrap();

        let auth = JwtAuthenticator::new(SECRET, 72).unwrap();
        assert!(matches!(
            auth.current_user_id(&token),
            Err(Error::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_rejects_expired_token() {
        let auth = JwtAuthenticator::new(SECRET, 72).unwrap();
        let token = auth
            .sign(&Claims {
                user_id: 42,
                username: "alice".to_string(),
                exp: (Utc::now() - Duration::hours(2)).timestamp(),
            })
            .unwrap();

        assert!(matches!(
            auth.current_user_id(&token),
            Err(Error::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_rejects_unusable_lifetimes() {
        for ttl in [0, -2, i64::MAX] {
            assert!(matches!(
                JwtAuthenticator::new(SECRET, ttl),
                Err(Error::Config(_))
            ));
        }
    }

    #[test]
    fn test_expiry_overflow_is_an_error() {
        // Representable as a duration, but past the last representable date
        let auth = JwtAuthenticator::new(SECRET, 1_000_000_000_000).unwrap();
        assert!(matches!(auth.issue_token(&user()), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_garbage() {
        let auth = JwtAuthenticator::new(SECRET, 72).unwrap();
        assert!(auth.current_user_id("not-a-token").is_err());
    }
}
