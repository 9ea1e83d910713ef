//! Thread-local RNG identifier source

use chrono::{DateTime, Utc};

use crate::domain::identifiers;
use crate::ports::IdentifierSource;

/// Draws identifiers from `rand::thread_rng()`
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdentifiers;

impl IdentifierSource for RandomIdentifiers {
    fn account_number(&self) -> String {
        identifiers::account_number(&mut rand::thread_rng())
    }

    fn card_number(&self) -> String {
        identifiers::card_number(&mut rand::thread_rng())
    }

    fn cvv(&self) -> String {
        identifiers::cvv(&mut rand::thread_rng())
    }

    fn transaction_reference(&self, now: DateTime<Utc>) -> String {
        identifiers::transaction_reference(now)
    }
}
