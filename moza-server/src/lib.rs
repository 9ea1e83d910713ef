//! Moza server - REST API over moza-core
//!
//! - **api**: axum router, handlers, auth middleware and the response envelope
//! - **server**: tracing setup and the listener with graceful shutdown

pub mod api;
pub mod server;

pub use api::{create_router, AppState};
