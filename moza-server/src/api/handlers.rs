// Request handlers for API endpoints
//
// Store work is synchronous, so every handler hands it to the blocking pool.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Response,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use moza_core::services::{RegisterRequest, TransferRequest};
use moza_core::{AccountType, Currency, LogEvent, MozaContext};

use crate::api::middleware::CurrentUser;
use crate::api::responses::{created, ok, ApiError, HealthResponse, TokenResponse};
use crate::api::AppState;

/// Login payload: `identity` is an email or a username
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identity: String,
    pub password: String,
}

/// Account creation payload
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub account_type: String,
    pub currency: String,
}

/// Card issuance payload
#[derive(Debug, Deserialize)]
pub struct CreateCardRequest {
    pub bank_account_id: i64,
    pub card_type: String,
    #[serde(default)]
    pub daily_limit: Decimal,
}

/// Run store work on the blocking pool
async fn blocking<T, F>(ctx: &Arc<MozaContext>, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&MozaContext) -> moza_core::domain::result::Result<T> + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    tokio::task::spawn_blocking(move || work(&ctx))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Blocking task failed");
            ApiError::internal()
        })?
        .map_err(ApiError::from)
}

/// GET /api/private
///
/// Auth smoke check; only reachable with a valid bearer token.
pub async fn private_ping() -> Response {
    ok("Protection Working", ())
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Response {
    let database = match blocking(&state.ctx, |ctx| ctx.repository.pending_migrations()).await {
        Ok(pending) if pending.is_empty() => "ok",
        Ok(_) => "migrations pending",
        Err(_) => "unavailable",
    };
    ok(
        "Moza API is running",
        HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: database.to_string(),
        },
    )
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let result = blocking(&state.ctx, move |ctx| ctx.user_service.register(request)).await;

    let user_id = result.as_ref().ok().map(|r| r.user.id);
    state.audit("user_registered", "/api/auth/register", user_id, &result);
    Ok(created("User created successfully", result?))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let result = blocking(&state.ctx, move |ctx| {
        ctx.user_service.login(&request.identity, &request.password)
    })
    .await;

    state.audit("user_login", "/api/auth/login", None, &result);
    Ok(ok("Success login", TokenResponse { token: result? }))
}

/// GET /api/user/profile
pub async fn profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    let user = blocking(&state.ctx, move |ctx| ctx.user_service.profile(user_id)).await?;
    Ok(ok("Profile retrieved successfully", user))
}

/// POST /api/banking/accounts
pub async fn create_account(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let account_type: AccountType = request
        .account_type
        .parse::<AccountType>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let currency: Currency = request
        .currency
        .parse::<Currency>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let result = blocking(&state.ctx, move |ctx| {
        ctx.account_service.create_account(user_id, account_type, currency)
    })
    .await;

    state.audit("account_created", "/api/banking/accounts", Some(user_id), &result);
    Ok(created("Bank account created successfully", result?))
}

/// GET /api/banking/accounts
pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    let accounts = blocking(&state.ctx, move |ctx| ctx.account_service.list_accounts(user_id)).await?;
    Ok(ok("Accounts retrieved successfully", accounts))
}

/// POST /api/banking/cards
pub async fn create_card(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    payload: Result<Json<CreateCardRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let result = blocking(&state.ctx, move |ctx| {
        ctx.card_service.create_card(
            user_id,
            request.bank_account_id,
            &request.card_type,
            request.daily_limit,
        )
    })
    .await;

    state.audit("card_created", "/api/banking/cards", Some(user_id), &result);
    Ok(created("Card created successfully", result?))
}

/// GET /api/banking/accounts/:id/cards
pub async fn list_cards(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(account_id): Path<i64>,
) -> Result<Response, ApiError> {
    let cards = blocking(&state.ctx, move |ctx| ctx.card_service.list_cards(user_id, account_id)).await?;
    Ok(ok("Cards retrieved successfully", cards))
}

/// POST /api/banking/transfer
pub async fn transfer(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let result = blocking(&state.ctx, move |ctx| {
        ctx.transfer_service.transfer(user_id, &request)
    })
    .await;

    state.audit("transfer", "/api/banking/transfer", Some(user_id), &result);
    Ok(ok("Transfer completed successfully", result?))
}

/// GET /api/banking/accounts/:id/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(account_id): Path<i64>,
) -> Result<Response, ApiError> {
    let transactions = blocking(&state.ctx, move |ctx| {
        ctx.transfer_service.list_transactions(user_id, account_id)
    })
    .await?;
    Ok(ok("Transactions retrieved successfully", transactions))
}

impl AppState {
    /// Record a privacy-safe audit event without blocking the response
    ///
    /// Only the event name, route, user id and error message are stored.
    pub(crate) fn audit<T>(
        &self,
        event: &str,
        route: &str,
        user_id: Option<i64>,
        outcome: &Result<T, ApiError>,
    ) {
        let Some(audit) = self.audit.clone() else {
            return;
        };

        let mut entry = LogEvent::new(event).with_route(route);
        if let Some(id) = user_id {
            entry = entry.with_user(id);
        }
        if let Err(e) = outcome {
            entry = entry.with_error(e.message.clone());
        }

        tokio::task::spawn_blocking(move || {
            if let Err(e) = audit.log(entry) {
                tracing::warn!(error = %e, "Failed to write audit event");
            }
        });
    }
}
