//! User domain model

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters that count as "special" for password strength
pub const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 30;

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// argon2id PHC string, never sent to clients
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("username pattern compiles"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@<>()\[\],;:]+@[^\s@<>()\[\],;:]+$").expect("email pattern compiles")
    })
}

/// Check whether a string looks like an email address
pub fn is_email(candidate: &str) -> bool {
    email_pattern().is_match(candidate.trim())
}

/// Validate username length and character set
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err("username must be between 3 and 30 characters");
    }
    if !username_pattern().is_match(username) {
        return Err("username can only contain letters, numbers, and underscores");
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err("password must be at least 8 characters long");
    }

    let mut has_number = false;
    let mut has_upper = false;
    let mut has_lower = false;
    let mut has_special = false;

    for c in password.chars() {
        if c.is_ascii_digit() {
            has_number = true;
        } else if c.is_ascii_uppercase() {
            has_upper = true;
        } else if c.is_ascii_lowercase() {
            has_lower = true;
        } else if PASSWORD_SPECIAL_CHARS.contains(c) {
            has_special = true;
        }
    }

    if !has_number {
        return Err("password must contain at least one number");
    }
    if !has_upper {
        return Err("password must contain at least one uppercase letter");
    }
    if !has_lower {
        return Err("password must contain at least one lowercase letter");
    }
    if !has_special {
        return Err("password must contain at least one special character");
    }
    Ok(())
}
