//! Payment card domain model

use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cards are valid for four years from issuance
pub const CARD_VALIDITY_MONTHS: u32 = 48;

/// A payment card bound to one bank account of the same user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub user_id: i64,
    pub bank_account_id: i64,
    /// 16-digit number, unique across the bank
    pub card_number: String,
    pub expiry_date: DateTime<Utc>,
    /// Never exposed outward
    #[serde(skip_serializing, default)]
    pub cvv: String,
    pub is_active: bool,
    pub daily_limit: Decimal,
    /// Free-form network name: VISA, MASTERCARD, ...
    pub card_type: String,
    pub created_at: DateTime<Utc>,
}

impl Card {
    /// Expiry for a card issued at `issued_at`
    pub fn expiry_for(issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at
            .checked_add_months(Months::new(CARD_VALIDITY_MONTHS))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Insert payload for a new card
#[derive(Debug, Clone)]
pub struct NewCard {
    pub user_id: i64,
    pub bank_account_id: i64,
    pub card_number: String,
    pub cvv: String,
    pub expiry_date: DateTime<Utc>,
    pub daily_limit: Decimal,
    pub card_type: String,
    pub issued_at: DateTime<Utc>,
}
