//! Transaction domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::{Currency, UnknownVariant};

/// Money is stored with two fractional digits
pub const MONEY_SCALE: u32 = 2;

/// True if the amount is representable without rounding at `MONEY_SCALE`
pub fn fits_money_scale(amount: Decimal) -> bool {
    amount.round_dp(MONEY_SCALE) == amount
}

/// Kind of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Transfer,
    Deposit,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Transfer => "TRANSFER",
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TRANSFER" => Ok(TransactionType::Transfer),
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            _ => Err(UnknownVariant::new("transaction type", s)),
        }
    }
}

/// Lifecycle state of a transaction record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            _ => Err(UnknownVariant::new("transaction status", s)),
        }
    }
}

/// Immutable record of a money movement between two bank accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: Decimal,
    /// Copied from the source account at the time of transfer
    pub currency: Currency,
    pub description: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    /// Human-facing unique reference, distinct from `id`
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// True if the account appears on either side of this record
    pub fn involves(&self, account_id: i64) -> bool {
        self.from_account_id == account_id || self.to_account_id == account_id
    }
}

/// Insert payload for a new transaction record
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: Decimal,
    pub currency: Currency,
    pub description: String,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}
