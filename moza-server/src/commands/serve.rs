//! Serve command - run the HTTP API

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use moza_core::{EntryPoint, LogEvent};
use moza_server::server::{init_tracing, serve};
use moza_server::AppState;

use super::{get_context, get_logger, log_event};

pub fn run(host: Option<String>, port: Option<u16>) -> Result<()> {
    let ctx = get_context()?;
    init_tracing(&ctx.config.logging);

    if ctx.config.auth.jwt_secret.is_empty() {
        bail!("No JWT secret configured. Set MOZA_SECRET or auth.jwtSecret in settings.json");
    }

    let host = host.unwrap_or_else(|| ctx.config.server.host.clone());
    let port = port.unwrap_or(ctx.config.server.port);
    let addr = format!("{}:{}", host, port);

    let logger = get_logger(EntryPoint::Server);
    log_event(&logger, LogEvent::new("server_started"));

    let mut state = AppState::new(Arc::new(ctx));
    if let Some(logger) = logger {
        state = state.with_audit(Arc::new(logger));
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(serve(state, &addr))
}
