//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
mod card;
pub mod logging;
pub mod migration;
mod status;
mod transfer;
mod user;

pub use account::AccountService;
pub use card::CardService;
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use status::{StatusService, StatusSummary};
pub use transfer::{TransferRequest, TransferService};
pub use user::{RegisterRequest, Registration, UserService};
