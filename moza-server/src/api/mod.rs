// Axum web server layer

use std::sync::Arc;

use axum::{
    middleware::from_fn,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use moza_core::{LoggingService, MozaContext};

pub mod handlers;
pub mod middleware;
pub mod responses;

/// Application state shared by every handler
///
/// Cloned per request; all members are behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<MozaContext>,
    /// Audit log; `None` disables audit events
    pub audit: Option<Arc<LoggingService>>,
}

impl AppState {
    pub fn new(ctx: Arc<MozaContext>) -> Self {
        Self { ctx, audit: None }
    }

    pub fn with_audit(mut self, audit: Arc<LoggingService>) -> Self {
        self.audit = Some(audit);
        self
    }
}

/// Create the Axum router with all routes and middleware
///
/// Middleware stack (outermost to innermost):
/// - CORS (any origin)
/// - Request id - echoes or generates `x-request-id`
/// - Tracing (tower-http::trace) - one span per request, tagged with the request id
/// - Bearer auth - protected routes only
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/private", get(handlers::private_ping))
        .route("/api/user/profile", get(handlers::profile))
        .route(
            "/api/banking/accounts",
            post(handlers::create_account).get(handlers::list_accounts),
        )
        .route("/api/banking/accounts/:id/cards", get(handlers::list_cards))
        .route(
            "/api/banking/accounts/:id/transactions",
            get(handlers::list_transactions),
        )
        .route("/api/banking/cards", post(handlers::create_card))
        .route("/api/banking/transfer", post(handlers::transfer))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .merge(protected)
        .layer(TraceLayer::new_for_http().make_span_with(middleware::request_span))
        .layer(from_fn(middleware::request_id))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
