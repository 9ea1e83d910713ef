//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
///
/// Ownership and existence failures are deliberately merged
/// (`Unauthorized`, `NotFoundOrUnauthorized`) so callers cannot probe for
/// accounts that belong to someone else.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Invalid identity or password")]
    InvalidCredentials,

    #[error("Unauthorized or account not found")]
    Unauthorized,

    #[error("Bank account not found or unauthorized")]
    NotFoundOrUnauthorized,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Destination account not found")]
    DestinationNotFound,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A uniqueness constraint rejected a write
    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid request error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// True if the store rejected a write because of a uniqueness constraint
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        let msg = err.to_string();
        if is_uniqueness_violation(&msg) {
            Self::Duplicate(msg)
        } else {
            Self::Persistence(msg)
        }
    }
}

/// Check if a store error message reports a uniqueness violation
fn is_uniqueness_violation(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("duplicate key")
        || lower.contains("unique constraint")
        || lower.contains("primary key constraint")
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniqueness_violation_detection() {
        assert!(is_uniqueness_violation(
            "Constraint Error: Duplicate key \"account_number: 123456789\" violates unique constraint"
        ));
        assert!(is_uniqueness_violation("violates PRIMARY KEY constraint"));
        assert!(!is_uniqueness_violation("Catalog Error: Table with name foo does not exist"));
    }

    #[test]
    fn test_merged_ownership_messages() {
        assert_eq!(Error::Unauthorized.to_string(), "Unauthorized or account not found");
        assert_eq!(
            Error::NotFoundOrUnauthorized.to_string(),
            "Bank account not found or unauthorized"
        );
    }

    #[test]
    fn test_is_duplicate() {
        assert!(Error::Duplicate("x".into()).is_duplicate());
        assert!(!Error::persistence("x").is_duplicate());
    }
}
