//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for storage and the ledger scope
//! - HS256 JWTs for the Authenticator port
//! - Thread-local RNG for the IdentifierSource port

pub mod duckdb;
pub mod jwt;
pub mod random;
