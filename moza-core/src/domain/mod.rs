//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod card;
pub mod identifiers;
pub mod result;
mod transaction;
pub mod user;

pub use account::{AccountType, BankAccount, Currency, NewBankAccount, UnknownVariant};
pub use card::{Card, NewCard, CARD_VALIDITY_MONTHS};
pub use transaction::{
    fits_money_scale, NewTransaction, Transaction, TransactionStatus, TransactionType, MONEY_SCALE,
};
pub use user::{NewUser, User};
