//! Identifier source port
//!
//! Services never draw identifiers directly; they ask an `IdentifierSource`
//! so tests can force collisions deterministically.

use chrono::{DateTime, Utc};

/// Source of account numbers, card numbers, CVVs and transfer references
pub trait IdentifierSource: Send + Sync {
    /// Next 9-digit account number candidate
    fn account_number(&self) -> String;

    /// Next 16-digit card number candidate
    fn card_number(&self) -> String;

    /// Next 3-digit CVV
    fn cvv(&self) -> String;

    /// Next transaction reference candidate for a transfer made at `now`
    fn transaction_reference(&self, now: DateTime<Utc>) -> String;
}
