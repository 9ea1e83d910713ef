//! CLI command implementations

pub mod fund;
pub mod logs;
pub mod migrate;
pub mod serve;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use moza_core::{EntryPoint, LogEvent, LoggingService, MozaContext};

/// Get the audit logger for the given surface
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger(entry_point: EntryPoint) -> Option<LoggingService> {
    let data_dir = get_data_dir().ok()?;
    std::fs::create_dir_all(&data_dir).ok()?;
    LoggingService::new(&data_dir, entry_point, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Get the moza data directory from environment or default
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("MOZA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".moza"))
        .context("Could not find home directory; set MOZA_DIR")
}

/// Open the data directory, creating it if needed, and wire the context
pub fn get_context() -> Result<MozaContext> {
    let data_dir = get_data_dir()?;

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    MozaContext::new(&data_dir).context("Failed to initialize moza context")
}
