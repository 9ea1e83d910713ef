//! Transfer engine - atomic debit, credit and ledger record
//!
//! Every transfer runs inside one `LedgerScope`. The scope holds the store
//! connection exclusively, so the balance check and both balance updates
//! cannot interleave with another transfer. Any early return drops the scope
//! and rolls back whatever was written.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::adapters::duckdb::{DuckDbRepository, LedgerScope};
use crate::config::LedgerSettings;
use crate::domain::result::{Error, Result};
use crate::domain::{
    fits_money_scale, BankAccount, NewTransaction, Transaction, TransactionStatus,
    TransactionType,
};
use crate::ports::IdentifierSource;

/// A request to move money between two accounts
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
}

/// Service owning the transfer path and account history
pub struct TransferService {
    repository: Arc<DuckDbRepository>,
    identifiers: Arc<dyn IdentifierSource>,
    policy: LedgerSettings,
}

impl TransferService {
    pub fn new(
        repository: Arc<DuckDbRepository>,
        identifiers: Arc<dyn IdentifierSource>,
        policy: LedgerSettings,
    ) -> Self {
        Self {
            repository,
            identifiers,
            policy,
        }
    }

    /// Move `amount` from an account the user owns to any existing account
    ///
    /// Transfers are not idempotent: repeating a request records a second,
    /// independent transaction.
    pub fn transfer(&self, user_id: i64, request: &TransferRequest) -> Result<Transaction> {
        if request.from_account_id == request.to_account_id {
            return Err(Error::invalid("Cannot transfer to the same account"));
        }
        self.check_amount(request.amount)?;

        let scope = self.repository.begin_ledger_scope().map_err(into_persistence)?;

        let source = scope
            .find_owned_account(user_id, request.from_account_id)?
            .ok_or(Error::Unauthorized)?;

        if source.balance < request.amount {
            return Err(Error::InsufficientBalance);
        }

        let destination = scope
            .find_account(request.to_account_id)?
            .ok_or(Error::DestinationNotFound)?;

        self.check_currencies(&source, &destination)?;

        let now = Utc::now();
        apply_balance_updates(&scope, &source, &destination, request.amount, now)?;

        let reference = self.fresh_reference(&scope)?;
        let transaction = scope
            .insert_transaction(&NewTransaction {
                from_account_id: source.id,
                to_account_id: destination.id,
                amount: request.amount,
                currency: source.currency,
                description: request.description.clone(),
                transaction_type: TransactionType::Transfer,
                status: TransactionStatus::Completed,
                reference,
                created_at: now,
            })
            .map_err(into_persistence)?;

        scope.commit().map_err(into_persistence)?;

        tracing::info!(
            user_id,
            transaction_id = transaction.id,
            from_account_id = source.id,
            to_account_id = destination.id,
            "Transfer completed"
        );
        Ok(transaction)
    }

    /// Transactions touching an owned account, newest first
    pub fn list_transactions(&self, user_id: i64, account_id: i64) -> Result<Vec<Transaction>> {
        self.repository
            .find_owned_account(user_id, account_id)?
            .ok_or(Error::Unauthorized)?;
        self.repository.list_transactions_for_account(account_id)
    }

    /// Credit an account directly, for seeding environments from the CLI
    ///
    /// Not a ledger entry: no transaction record is written.
    pub fn fund_account(&self, account_id: i64, amount: Decimal) -> Result<BankAccount> {
        if amount <= Decimal::ZERO {
            return Err(Error::invalid("Amount must be positive"));
        }
        if !fits_money_scale(amount) {
            return Err(Error::invalid("Amount cannot have more than two decimal places"));
        }

        if !self.repository.credit_account(account_id, amount, Utc::now())? {
            return Err(Error::not_found(format!("Bank account {}", account_id)));
        }

        tracing::info!(account_id, "Account funded");
        self.repository
            .find_account(account_id)?
            .ok_or_else(|| Error::not_found(format!("Bank account {}", account_id)))
    }

    fn check_amount(&self, amount: Decimal) -> Result<()> {
        if !fits_money_scale(amount) {
            return Err(Error::invalid("Amount cannot have more than two decimal places"));
        }
        if self.policy.reject_non_positive_amounts && amount <= Decimal::ZERO {
            return Err(Error::invalid("Amount must be positive"));
        }
        Ok(())
    }

    fn check_currencies(&self, source: &BankAccount, destination: &BankAccount) -> Result<()> {
        if source.currency == destination.currency {
            return Ok(());
        }
        if self.policy.reject_currency_mismatch {
            return Err(Error::invalid(format!(
                "Cannot transfer {} to a {} account",
                source.currency, destination.currency
            )));
        }
        tracing::warn!(
            from_account_id = source.id,
            to_account_id = destination.id,
            from_currency = %source.currency,
            to_currency = %destination.currency,
            "Cross-currency transfer moves the raw amount without conversion"
        );
        Ok(())
    }

    /// Draw references until one is unused inside the scope
    fn fresh_reference(&self, scope: &LedgerScope<'_>) -> Result<String> {
        let attempts = self.policy.identifier_attempts.max(1);
        for attempt in 1..=attempts {
            let candidate = self.identifiers.transaction_reference(Utc::now());
            if !scope.reference_exists(&candidate).map_err(into_persistence)? {
                return Ok(candidate);
            }
            tracing::warn!(attempt, max = attempts, "Transaction reference collision, regenerating");
        }
        Err(Error::persistence(format!(
            "Could not allocate a unique transaction reference after {} attempts",
            attempts
        )))
    }
}

/// Apply the debit and the credit in ascending account id order
fn apply_balance_updates(
    scope: &LedgerScope<'_>,
    source: &BankAccount,
    destination: &BankAccount,
    amount: Decimal,
    at: DateTime<Utc>,
) -> Result<()> {
    let debit = || -> Result<()> {
        match scope.debit(source.id, amount, at) {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::InsufficientBalance),
            Err(e) => Err(into_persistence(e)),
        }
    };
    let credit = || -> Result<()> {
        match scope.credit(destination.id, amount, at) {
            Ok(true) => Ok(()),
            // Only reachable with a negative amount larger than the destination balance
            Ok(false) => Err(Error::InsufficientBalance),
            Err(e) => Err(into_persistence(e)),
        }
    };

    if source.id < destination.id {
        debit()?;
        credit()
    } else {
        credit()?;
        debit()
    }
}

/// Collapse store failures after the scope opened into `Persistence`
fn into_persistence(err: Error) -> Error {
    tracing::error!("Ledger write failed: {}", err);
    match err {
        Error::Persistence(_) => err,
        other => Error::persistence(other.to_string()),
    }
}
