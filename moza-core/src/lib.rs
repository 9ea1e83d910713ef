//! Moza Core - Business logic for the Moza banking backend
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (User, BankAccount, Card, Transaction)
//! - **ports**: Trait definitions for external dependencies (Authenticator, IdentifierSource)
//! - **services**: Business logic orchestration, including the transfer engine
//! - **adapters**: Concrete implementations (DuckDB, JWT, RNG)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::duckdb::DuckDbRepository;
use adapters::jwt::JwtAuthenticator;
use adapters::random::RandomIdentifiers;
use config::Config;
use ports::{Authenticator, IdentifierSource};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{AccountType, BankAccount, Card, Currency, Transaction, User};
pub use services::{EntryPoint, LogEvent, LoggingService};

/// Database file inside the data directory
pub const DB_FILE: &str = "moza.duckdb";

/// Main context for Moza operations
///
/// This is the primary entry point for all business logic. It holds
/// the store handle, configuration, and all services.
pub struct MozaContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub authenticator: Arc<dyn Authenticator>,
    pub user_service: UserService,
    pub account_service: AccountService,
    pub card_service: CardService,
    pub transfer_service: TransferService,
    pub status_service: StatusService,
}

impl MozaContext {
    /// Open the database in `data_dir` using `settings.json` and the environment
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        let db_path = data_dir.join(DB_FILE);
        let repository = DuckDbRepository::new(&db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
        Self::with_repository(config, Arc::new(repository))
    }

    /// Private in-memory store, used by tests and demos
    pub fn in_memory(config: Config) -> Result<Self> {
        let repository = DuckDbRepository::in_memory().context("Failed to open in-memory database")?;
        Self::with_repository(config, Arc::new(repository))
    }

    /// Wire services over an existing repository using random identifiers
    pub fn with_repository(config: Config, repository: Arc<DuckDbRepository>) -> Result<Self> {
        Self::with_identifiers(config, repository, Arc::new(RandomIdentifiers))
    }

    /// Wire services over an existing repository and identifier source
    pub fn with_identifiers(
        config: Config,
        repository: Arc<DuckDbRepository>,
        identifiers: Arc<dyn IdentifierSource>,
    ) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        repository
            .ensure_schema()
            .context("Failed to apply database migrations")?;

        let authenticator: Arc<dyn Authenticator> = Arc::new(JwtAuthenticator::new(
            config.auth.jwt_secret.clone(),
            config.auth.token_ttl_hours,
        )?);
        let attempts = config.ledger.identifier_attempts;

        let user_service = UserService::new(Arc::clone(&repository), Arc::clone(&authenticator));
        let account_service =
            AccountService::new(Arc::clone(&repository), Arc::clone(&identifiers), attempts);
        let card_service =
            CardService::new(Arc::clone(&repository), Arc::clone(&identifiers), attempts);
        let transfer_service = TransferService::new(
            Arc::clone(&repository),
            Arc::clone(&identifiers),
            config.ledger.clone(),
        );
        let status_service = StatusService::new(Arc::clone(&repository));

        Ok(Self {
            config,
            repository,
            authenticator,
            user_service,
            account_service,
            card_service,
            transfer_service,
            status_service,
        })
    }
}
