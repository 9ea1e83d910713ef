//! Status service - store-wide counts and balance totals

use std::sync::Arc;

use serde::Serialize;

use crate::adapters::duckdb::{CurrencyTotal, DuckDbRepository};
use crate::domain::result::Result;

/// Status service for operator summaries
pub struct StatusService {
    repository: Arc<DuckDbRepository>,
}

impl StatusService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Get overall status summary
    pub fn get_status(&self) -> Result<StatusSummary> {
        let counts = self.repository.counts()?;
        let balances = self.repository.balance_totals()?;
        let pending_migrations = self.repository.pending_migrations()?;

        Ok(StatusSummary {
            total_users: counts.users,
            total_accounts: counts.accounts,
            total_cards: counts.cards,
            total_transactions: counts.transactions,
            balances,
            pending_migrations,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_users: i64,
    pub total_accounts: i64,
    pub total_cards: i64,
    pub total_transactions: i64,
    /// Balances grouped by currency; amounts in different currencies are never summed
    pub balances: Vec<CurrencyTotal>,
    pub pending_migrations: Vec<String>,
}
