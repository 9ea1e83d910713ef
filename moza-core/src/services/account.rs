//! Account store - bank account creation and ownership lookups

use std::sync::Arc;

use chrono::Utc;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{AccountType, BankAccount, Currency, NewBankAccount};
use crate::ports::IdentifierSource;

/// Run `insert` with fresh identifiers until it stops colliding
///
/// Only uniqueness violations are retried; any other failure is returned as
/// is. Exhausting `attempts` surfaces a persistence error.
pub(crate) fn insert_with_fresh_identifier<T>(
    attempts: u32,
    kind: &str,
    mut insert: impl FnMut() -> Result<T>,
) -> Result<T> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match insert() {
            Err(e) if e.is_duplicate() => {
                tracing::warn!(attempt, max = attempts, "{} collision, regenerating", kind);
            }
            other => return other,
        }
    }
    Err(Error::persistence(format!(
        "Could not allocate a unique {} after {} attempts",
        kind, attempts
    )))
}

/// Service for bank account creation and listing
pub struct AccountService {
    repository: Arc<DuckDbRepository>,
    identifiers: Arc<dyn IdentifierSource>,
    identifier_attempts: u32,
}

impl AccountService {
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

    /// Open a zero-balance, active account with a fresh account number
    pub fn create_account(
        &self,
        user_id: i64,
        account_type: AccountType,
        currency: Currency,
    ) -> Result<BankAccount> {
        let account = insert_with_fresh_identifier(self.identifier_attempts, "account number", || {
            self.repository.insert_account(&NewBankAccount {
                user_id,
                account_type,
                currency,
                account_number: self.identifiers.account_number(),
                opened_at: Utc::now(),
            })
        })?;

        tracing::info!(user_id, account_id = account.id, "Bank account created");
        Ok(account)
    }

    /// All accounts owned by the user, in creation order
    pub fn list_accounts(&self, user_id: i64) -> Result<Vec<BankAccount>> {
        self.repository.list_accounts_for_user(user_id)
    }

    /// Load an account only if the user owns it
    ///
    /// Missing and foreign accounts both fail with `NotFoundOrUnauthorized`.
    pub fn get_owned_account(&self, user_id: i64, account_id: i64) -> Result<BankAccount> {
        self.repository
            .find_owned_account(user_id, account_id)?
            .ok_or(Error::NotFoundOrUnauthorized)
    }
}
