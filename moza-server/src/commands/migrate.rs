//! Migrate command - apply pending schema migrations

use anyhow::{Context, Result};

use moza_core::adapters::duckdb::DuckDbRepository;
use moza_core::{EntryPoint, LogEvent, DB_FILE};

use super::{get_data_dir, get_logger, log_event};
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    let db_path = data_dir.join(DB_FILE);
    let repository = DuckDbRepository::new(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    let result = repository.run_migrations().context("Migration failed")?;

    let logger = get_logger(EntryPoint::Cli);
    log_event(&logger, LogEvent::new("migrations_applied").with_command("migrate"));

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.applied.is_empty() {
        output::info(&format!(
            "Schema is up to date ({} migrations applied)",
            result.already_applied
        ));
    } else {
        for name in &result.applied {
            println!("  applied {}", name);
        }
        output::success(&format!("Applied {} migration(s)", result.applied.len()));
    }

    Ok(())
}
