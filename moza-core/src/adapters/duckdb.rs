//! DuckDB repository implementation

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::types::Type;
use duckdb::{params, Connection, Row};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{
    BankAccount, Card, NewBankAccount, NewCard, NewTransaction, NewUser, Transaction, User,
};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Format used when binding timestamps as `?::TIMESTAMP`
const TIMESTAMP_BIND_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Format of `CAST(ts AS VARCHAR)`; the fractional part is optional
const TIMESTAMP_READ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, full_name, CAST(created_at AS VARCHAR)";

const ACCOUNT_COLUMNS: &str = "id, user_id, account_type, currency, CAST(balance AS VARCHAR),
     account_number, is_active, CAST(last_activity AS VARCHAR),
     CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)";

const CARD_COLUMNS: &str = "id, user_id, bank_account_id, card_number,
     CAST(expiry_date AS VARCHAR), cvv, is_active, CAST(daily_limit AS VARCHAR),
     card_type, CAST(created_at AS VARCHAR)";

const TRANSACTION_COLUMNS: &str = "id, from_account_id, to_account_id, CAST(amount AS VARCHAR),
     currency, description, transaction_type, status, reference,
     CAST(created_at AS VARCHAR)";

/// Store-wide totals used by the status report
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreCounts {
    pub users: i64,
    pub accounts: i64,
    pub cards: i64,
    pub transactions: i64,
}

/// Sum of balances held in one currency
#[derive(Debug, Clone, Serialize)]
pub struct CurrencyTotal {
    pub currency: String,
    pub accounts: i64,
    pub total_balance: Decimal,
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) a database file
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which occur when a CLI command and the server touch the same file.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            "Database busy, retrying: {}",
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(last_error.map(Error::from).unwrap_or_else(|| {
            Error::persistence(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    /// Attempt to open a database connection (called by new() with retry logic)
    fn try_open_connection(db_path: &Path) -> duckdb::Result<Connection> {
        // Extension autoloading stays off; nothing here needs an extension
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    /// Path of the database file, `None` for in-memory stores
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::persistence(format!("Lock poisoned: {}", e)))
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    /// Names of migrations not yet applied
    pub fn pending_migrations(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        MigrationService::new(&conn).get_pending()
    }

    /// Open a transactional scope holding the connection until commit or drop
    pub fn begin_ledger_scope(&self) -> Result<LedgerScope<'_>> {
        LedgerScope::begin(self.conn()?)
    }

    // === User operations ===

    pub fn insert_user(&self, user: &NewUser) -> Result<User> {
        let conn = self.conn()?;
        let id: i64 = conn.query_row(
            "INSERT INTO users (username, email, password_hash, full_name, created_at)
             VALUES (?, ?, ?, ?, ?::TIMESTAMP)
             RETURNING id",
            params![
                user.username,
                user.email,
                user.password_hash,
                user.full_name,
                bind_timestamp(&user.created_at),
            ],
            |row| row.get(0),
        )?;
        fetch_user(&conn, "id = ?", id)?
            .ok_or_else(|| Error::persistence("Inserted user not readable"))
    }

    pub fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        fetch_user(&conn, "id = ?", id)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        fetch_user(&conn, "email = ?", email)
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        fetch_user(&conn, "username = ?", username)
    }

    // === Bank account operations ===

    pub fn insert_account(&self, account: &NewBankAccount) -> Result<BankAccount> {
        let conn = self.conn()?;
        let opened = bind_timestamp(&account.opened_at);
        let id: i64 = conn.query_row(
            "INSERT INTO bank_accounts (user_id, account_type, currency, balance, account_number,
                                        is_active, last_activity, created_at, updated_at)
             VALUES (?, ?, ?, 0, ?, TRUE, ?::TIMESTAMP, ?::TIMESTAMP, ?::TIMESTAMP)
             RETURNING id",
            params![
                account.user_id,
                account.account_type.as_str(),
                account.currency.as_str(),
                account.account_number,
                opened,
                opened,
                opened,
            ],
            |row| row.get(0),
        )?;
        fetch_account(&conn, id)?
            .ok_or_else(|| Error::persistence("Inserted account not readable"))
    }

    /// All accounts owned by a user, in insertion order
    pub fn list_accounts_for_user(&self, user_id: i64) -> Result<Vec<BankAccount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM bank_accounts WHERE user_id = ? ORDER BY id",
            ACCOUNT_COLUMNS
        ))?;
        let accounts = stmt
            .query_map([user_id], row_to_account)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(accounts)
    }

    pub fn find_account(&self, account_id: i64) -> Result<Option<BankAccount>> {
        let conn = self.conn()?;
        fetch_account(&conn, account_id)
    }

    pub fn find_owned_account(&self, user_id: i64, account_id: i64) -> Result<Option<BankAccount>> {
        let conn = self.conn()?;
        fetch_owned_account(&conn, user_id, account_id)
    }

    /// Credit an account outside of a ledger scope; false if it was not updated
    pub fn credit_account(&self, account_id: i64, amount: Decimal, at: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn()?;
        Ok(apply_credit(&conn, account_id, amount, at)? == 1)
    }

    // === Card operations ===

    pub fn insert_card(&self, card: &NewCard) -> Result<Card> {
        let conn = self.conn()?;
        let id: i64 = conn.query_row(
            "INSERT INTO cards (user_id, bank_account_id, card_number, expiry_date, cvv,
                                is_active, daily_limit, card_type, created_at)
             VALUES (?, ?, ?, ?::TIMESTAMP, ?, TRUE, ?::DECIMAL(20,2), ?, ?::TIMESTAMP)
             RETURNING id",
            params![
                card.user_id,
                card.bank_account_id,
                card.card_number,
                bind_timestamp(&card.expiry_date),
                card.cvv,
                card.daily_limit.to_string(),
                card.card_type,
                bind_timestamp(&card.issued_at),
            ],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM cards WHERE id = ?", CARD_COLUMNS))?;
        optional(stmt.query_row([id], row_to_card))?
            .ok_or_else(|| Error::persistence("Inserted card not readable"))
    }

    /// All cards bound to an account, in insertion order
    pub fn list_cards_for_account(&self, account_id: i64) -> Result<Vec<Card>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM cards WHERE bank_account_id = ? ORDER BY id",
            CARD_COLUMNS
        ))?;
        let cards = stmt
            .query_map([account_id], row_to_card)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(cards)
    }

    // === Transaction operations ===

    /// Transactions where the account is source or destination, newest first
    pub fn list_transactions_for_account(&self, account_id: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions
             WHERE from_account_id = ? OR to_account_id = ?
             ORDER BY created_at DESC, id DESC",
            TRANSACTION_COLUMNS
        ))?;
        let transactions = stmt
            .query_map([account_id, account_id], row_to_transaction)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(transactions)
    }

    // === Reporting ===

    pub fn counts(&self) -> Result<StoreCounts> {
        let conn = self.conn()?;
        let counts = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM bank_accounts),
                    (SELECT COUNT(*) FROM cards),
                    (SELECT COUNT(*) FROM transactions)",
            [],
            |row| {
                Ok(StoreCounts {
                    users: row.get(0)?,
                    accounts: row.get(1)?,
                    cards: row.get(2)?,
                    transactions: row.get(3)?,
                })
            },
        )?;
        Ok(counts)
    }

    pub fn balance_totals(&self) -> Result<Vec<CurrencyTotal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT currency, COUNT(*), CAST(SUM(balance) AS VARCHAR)
             FROM bank_accounts
             GROUP BY currency
             ORDER BY currency",
        )?;
        let totals = stmt
            .query_map([], |row| {
                Ok(CurrencyTotal {
                    currency: row.get(0)?,
                    accounts: row.get(1)?,
                    total_balance: column(row, 2)?,
                })
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(totals)
    }
}

/// Exclusive transactional scope over the store connection
///
/// Holds the connection lock from `BEGIN` until `commit`. Dropping the scope
/// without committing rolls every write back.
pub struct LedgerScope<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl<'a> LedgerScope<'a> {
    fn begin(conn: MutexGuard<'a, Connection>) -> Result<Self> {
        conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    pub fn find_owned_account(&self, user_id: i64, account_id: i64) -> Result<Option<BankAccount>> {
        fetch_owned_account(&self.conn, user_id, account_id)
    }

    pub fn find_account(&self, account_id: i64) -> Result<Option<BankAccount>> {
        fetch_account(&self.conn, account_id)
    }

    /// Subtract `amount` only if the balance covers it; false when the guard misses
    pub fn debit(&self, account_id: i64, amount: Decimal, at: DateTime<Utc>) -> Result<bool> {
        let ts = bind_timestamp(&at);
        let amount = amount.to_string();
        let updated = self.conn.execute(
            "UPDATE bank_accounts
             SET balance = balance - ?::DECIMAL(20,2),
                 last_activity = ?::TIMESTAMP,
                 updated_at = ?::TIMESTAMP
             WHERE id = ? AND balance >= ?::DECIMAL(20,2)",
            params![amount, ts, ts, account_id, amount],
        )?;
        Ok(updated == 1)
    }

    /// Add `amount`; false when the account does not exist or would go negative
    pub fn credit(&self, account_id: i64, amount: Decimal, at: DateTime<Utc>) -> Result<bool> {
        Ok(apply_credit(&self.conn, account_id, amount, at)? == 1)
    }

    pub fn reference_exists(&self, reference: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE reference = ?",
            [reference],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn insert_transaction(&self, tx: &NewTransaction) -> Result<Transaction> {
        let id: i64 = self.conn.query_row(
            "INSERT INTO transactions (from_account_id, to_account_id, amount, currency,
                                       description, transaction_type, status, reference, created_at)
             VALUES (?, ?, ?::DECIMAL(20,2), ?, ?, ?, ?, ?, ?::TIMESTAMP)
             RETURNING id",
            params![
                tx.from_account_id,
                tx.to_account_id,
                tx.amount.to_string(),
                tx.currency.as_str(),
                tx.description,
                tx.transaction_type.as_str(),
                tx.status.as_str(),
                tx.reference,
                bind_timestamp(&tx.created_at),
            ],
            |row| row.get(0),
        )?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE id = ?",
            TRANSACTION_COLUMNS
        ))?;
        optional(stmt.query_row([id], row_to_transaction))?
            .ok_or_else(|| Error::persistence("Inserted transaction not readable"))
    }

    /// Make every write in the scope durable
    pub fn commit(mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for LedgerScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::error!("Failed to roll back ledger scope: {}", e);
            }
        }
    }
}

// === Row mapping ===

fn fetch_user<P: duckdb::ToSql>(conn: &Connection, predicate: &str, value: P) -> Result<Option<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE {}",
        USER_COLUMNS, predicate
    ))?;
    Ok(optional(stmt.query_row([value], row_to_user))?)
}

fn fetch_account(conn: &Connection, account_id: i64) -> Result<Option<BankAccount>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM bank_accounts WHERE id = ?",
        ACCOUNT_COLUMNS
    ))?;
    Ok(optional(stmt.query_row([account_id], row_to_account))?)
}

fn fetch_owned_account(conn: &Connection, user_id: i64, account_id: i64) -> Result<Option<BankAccount>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM bank_accounts WHERE id = ? AND user_id = ?",
        ACCOUNT_COLUMNS
    ))?;
    Ok(optional(stmt.query_row([account_id, user_id], row_to_account))?)
}

/// Add `amount` unless the result would be negative
fn apply_credit(conn: &Connection, account_id: i64, amount: Decimal, at: DateTime<Utc>) -> Result<usize> {
    let ts = bind_timestamp(&at);
    let amount = amount.to_string();
    let updated = conn.execute(
        "UPDATE bank_accounts
         SET balance = balance + ?::DECIMAL(20,2),
             last_activity = ?::TIMESTAMP,
             updated_at = ?::TIMESTAMP
         WHERE id = ? AND balance + ?::DECIMAL(20,2) >= 0",
        params![amount, ts, ts, account_id, amount],
    )?;
    Ok(updated)
}

fn row_to_user(row: &Row) -> duckdb::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        full_name: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
    })
}

fn row_to_account(row: &Row) -> duckdb::Result<BankAccount> {
    Ok(BankAccount {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_type: column(row, 2)?,
        currency: column(row, 3)?,
        balance: column(row, 4)?,
        account_number: row.get(5)?,
        is_active: row.get(6)?,
        last_activity: timestamp_column(row, 7)?,
        created_at: timestamp_column(row, 8)?,
        updated_at: timestamp_column(row, 9)?,
    })
}

fn row_to_card(row: &Row) -> duckdb::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        user_id: row.get(1)?,
        bank_account_id: row.get(2)?,
        card_number: row.get(3)?,
        expiry_date: timestamp_column(row, 4)?,
        cvv: row.get(5)?,
        is_active: row.get(6)?,
        daily_limit: column(row, 7)?,
        card_type: row.get(8)?,
        created_at: timestamp_column(row, 9)?,
    })
}

fn row_to_transaction(row: &Row) -> duckdb::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        from_account_id: row.get(1)?,
        to_account_id: row.get(2)?,
        amount: column(row, 3)?,
        currency: column(row, 4)?,
        description: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        transaction_type: column(row, 6)?,
        status: column(row, 7)?,
        reference: row.get(8)?,
        created_at: timestamp_column(row, 9)?,
    })
}

/// Read a text column and parse it into a domain value
fn column<T>(row: &Row, idx: usize) -> duckdb::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn timestamp_column(row: &Row, idx: usize) -> duckdb::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_READ_FORMAT).map(|naive| naive.and_utc())
}

fn bind_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_BIND_FORMAT).to_string()
}

fn optional<T>(result: duckdb::Result<T>) -> duckdb::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}
