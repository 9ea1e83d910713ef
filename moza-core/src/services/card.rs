//! Card store - card issuance bound to an owned account

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{fits_money_scale, Card, NewCard};
use crate::ports::IdentifierSource;

use super::account::insert_with_fresh_identifier;

/// Service for issuing and listing cards
pub struct CardService {
    repository: Arc<DuckDbRepository>,
    identifiers: Arc<dyn IdentifierSource>,
    identifier_attempts: u32,
}

impl CardService {
    pub fn new(
        repository: Arc<DuckDbRepository>,
        identifiers: Arc<dyn IdentifierSource>,
        identifier_attempts: u32,
    ) -> Self {
        Self {
            repository,
            identifiers,
            identifier_attempts,
        }
    }

    /// Issue a card for an account the user owns
    ///
    /// The ownership check runs before any input validation so a foreign
    /// account id never yields a different error than a missing one.
    pub fn create_card(
        &self,
        user_id: i64,
        account_id: i64,
        card_type: &str,
        daily_limit: Decimal,
    ) -> Result<Card> {
        self.owned_account_id(user_id, account_id)?;

        let card_type = card_type.trim().to_uppercase();
        if card_type.is_empty() {
            return Err(Error::invalid("card_type is required"));
        }
        if daily_limit < Decimal::ZERO {
            return Err(Error::invalid("daily_limit cannot be negative"));
        }
        if !fits_money_scale(daily_limit) {
            return Err(Error::invalid("daily_limit cannot have more than two decimal places"));
        }

        let card = insert_with_fresh_identifier(self.identifier_attempts, "card number", || {
            let issued_at = Utc::now();
            self.repository.insert_card(&NewCard {
                user_id,
                bank_account_id: account_id,
                card_number: self.identifiers.card_number(),
                cvv: self.identifiers.cvv(),
                expiry_date: Card::expiry_for(issued_at),
                daily_limit,
                card_type: card_type.clone(),
                issued_at,
            })
        })?;

        tracing::info!(user_id, account_id, card_id = card.id, "Card issued");
        Ok(card)
    }

    /// All cards bound to an account the user owns
    pub fn list_cards(&self, user_id: i64, account_id: i64) -> Result<Vec<Card>> {
        self.owned_account_id(user_id, account_id)?;
        self.repository.list_cards_for_account(account_id)
    }

    fn owned_account_id(&self, user_id: i64, account_id: i64) -> Result<i64> {
        self.repository
            .find_owned_account(user_id, account_id)?
            .map(|account| account.id)
            .ok_or(Error::NotFoundOrUnauthorized)
    }
}
