//! Authentication port
//!
//! Turns a bearer credential into the id of a verified user. The token
//! format is an adapter concern.

use crate::domain::result::Result;
use crate::domain::User;

/// Issues and verifies bearer credentials
pub trait Authenticator: Send + Sync {
    /// Issue a credential for a freshly registered or logged-in user
    fn issue_token(&self, user: &User) -> Result<String>;

    /// Resolve a credential to the user id it was issued for
    ///
    /// Fails with `Error::Unauthenticated` for malformed, tampered or
    /// expired credentials.
    fn current_user_id(&self, token: &str) -> Result<i64>;
}
