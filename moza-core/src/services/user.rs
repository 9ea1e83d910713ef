//! User service - registration, login and profile lookups

use std::sync::{Arc, OnceLock};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::user::{is_email, validate_password, validate_username};
use crate::domain::{NewUser, User};
use crate::ports::Authenticator;

/// Registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
}

/// Successful registration: the new user and a ready-to-use token
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub token: String,
    pub user: User,
}

/// Service for user accounts and credentials
pub struct UserService {
    repository: Arc<DuckDbRepository>,
    authenticator: Arc<dyn Authenticator>,
}

impl UserService {
    pub fn new(repository: Arc<DuckDbRepository>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            repository,
            authenticator,
        }
    }

    /// Register a new user and issue a token for them
    pub fn register(&self, request: RegisterRequest) -> Result<Registration> {
        let email = request.email.trim();
        let username = request.username.trim();

        if !is_email(email) {
            return Err(Error::invalid("Invalid email format"));
        }
        validate_username(username).map_err(Error::invalid)?;
        validate_password(&request.password).map_err(Error::invalid)?;

        if self.repository.find_user_by_email(email)?.is_some() {
            return Err(Error::Conflict("Email already registered".to_string()));
        }
        if self.repository.find_user_by_username(username)?.is_some() {
            return Err(Error::Conflict("Username already taken".to_string()));
        }

        let password_hash = hash_password(&request.password)?;
        let user = self
            .repository
            .insert_user(&NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                full_name: request.full_name.trim().to_string(),
                created_at: Utc::now(),
            })
            .map_err(|e| match e {
                // Lost a race with a concurrent registration
                Error::Duplicate(_) => Error::Conflict("Email or username already taken".to_string()),
                other => other,
            })?;

        let token = self.authenticator.issue_token(&user)?;
        tracing::info!(user_id = user.id, "User registered");
        Ok(Registration { token, user })
    }

    /// Exchange an email or username plus password for a token
    pub fn login(&self, identity: &str, password: &str) -> Result<String> {
        let identity = identity.trim();
        let user = if is_email(identity) {
            self.repository.find_user_by_email(identity)?
        } else {
            self.repository.find_user_by_username(identity)?
        };

        let Some(user) = user else {
            // Keep the timing of unknown identities close to wrong passwords
            let _ = verify_password(password, dummy_hash());
            return Err(Error::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash) {
            return Err(Error::InvalidCredentials);
        }

        tracing::info!(user_id = user.id, "User logged in");
        self.authenticator.issue_token(&user)
    }

    pub fn profile(&self, user_id: i64) -> Result<User> {
        self.repository
            .find_user_by_id(user_id)?
            .ok_or_else(|| Error::not_found("User not found"))
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::persistence(format!("Couldn't hash password: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_password("dummy-Passw0rd!").unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Str0ng!pass").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Str0ng!pass", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", ""));
    }
}
