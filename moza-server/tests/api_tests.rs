// Integration tests for the HTTP API - real router, in-memory store

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use moza_core::config::Config;
use moza_core::MozaContext;
use moza_server::{create_router, AppState};

// ============================================================================
// Test Helpers
// ============================================================================

fn create_test_app() -> (Router, Arc<MozaContext>) {
    let mut config = Config::default();
    config.auth.jwt_secret = "api-tests-secret".to_string();
    let ctx = Arc::new(MozaContext::in_memory(config).unwrap());
    let app = create_router(AppState::new(Arc::clone(&ctx)));
    (app, ctx)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Register a user and return their token
async fn register(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "Str0ng!pass",
            "full_name": "Test User"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn create_account(app: &Router, token: &str, currency: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/banking/accounts",
        Some(token),
        Some(json!({"account_type": "CHECKING", "currency": currency})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create account failed: {}", body);
    body["data"]["id"].as_i64().unwrap()
}

// ============================================================================
// Public Routes
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_200() {
    let (app, _) = create_test_app();

    let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["database"], "ok");
}

#[tokio::test]
async fn test_register_returns_token_and_user() {
    let (app, ctx) = create_test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "Str0ng!pass",
            "full_name": "Alice"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "User created successfully");
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert!(body["data"]["user"].get("password_hash").is_none());

    let token = body["data"]["token"].as_str().unwrap();
    let user_id = body["data"]["user"]["id"].as_i64().unwrap();
    assert_eq!(ctx.authenticator.current_user_id(token).unwrap(), user_id);
}

#[tokio::test]
async fn test_register_conflict_and_validation() {
    let (app, _) = create_test_app();
    register(&app, "alice").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "alice2",
            "email": "alice@example.com",
            "password": "Str0ng!pass"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Email already registered");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "bob",
            "email": "bob@example.com",
            "password": "weakpass"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "password must contain at least one number");
}

#[tokio::test]
async fn test_malformed_json_is_invalid_input() {
    let (app, _) = create_test_app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Invalid input");
}

#[tokio::test]
async fn test_login_by_email_or_username() {
    let (app, _) = create_test_app();
    register(&app, "alice").await;

    for identity in ["alice", "alice@example.com"] {
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"identity": identity, "password": "Str0ng!pass"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Success login");
        assert!(body["data"]["token"].as_str().is_some());
    }

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"identity": "alice", "password": "Wr0ng!pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid identity or password");
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_protected_routes_require_bearer_token() {
    let (app, _) = create_test_app();

    let (status, body) = send(&app, Method::GET, "/api/banking/accounts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");

    let (status, _) = send(&app, Method::GET, "/api/user/profile", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_private_ping_requires_valid_token() {
    let (app, _) = create_test_app();

    let (status, body) = send(&app, Method::GET, "/api/private", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Missing or malformed JWT");

    let token = register(&app, "alice").await;
    let (status, body) = send(&app, Method::GET, "/api/private", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Protection Working");
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_profile() {
    let (app, _) = create_test_app();
    let token = register(&app, "alice").await;

    let (status, body) = send(&app, Method::GET, "/api/user/profile", Some(&token), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Profile retrieved successfully");
    assert_eq!(body["data"]["email"], "alice@example.com");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (app, _) = create_test_app();

    let request = Request::builder()
        .uri("/api/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-123");
}

// ============================================================================
// Banking
// ============================================================================

#[tokio::test]
async fn test_account_creation_and_listing() {
    let (app, _) = create_test_app();
    let token = register(&app, "alice").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/banking/accounts",
        Some(&token),
        Some(json!({"account_type": "savings", "currency": "eur"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Bank account created successfully");
    assert_eq!(body["data"]["account_type"], "SAVINGS");
    assert_eq!(body["data"]["currency"], "EUR");
    assert_eq!(body["data"]["balance"], "0.00");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/banking/accounts",
        Some(&token),
        Some(json!({"account_type": "CHECKING", "currency": "JPY"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, body) = send(&app, Method::GET, "/api/banking/accounts", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Accounts retrieved successfully");
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_card_issuance_and_ownership() {
    let (app, _) = create_test_app();
    let alice = register(&app, "alice").await;
    let mallory = register(&app, "mallory").await;
    let account_id = create_account(&app, &alice, "USD").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/banking/cards",
        Some(&alice),
        Some(json!({"bank_account_id": account_id, "card_type": "visa", "daily_limit": 500})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Card created successfully");
    assert_eq!(body["data"]["card_type"], "VISA");
    assert!(body["data"].get("cvv").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/banking/cards",
        Some(&mallory),
        Some(json!({"bank_account_id": account_id, "card_type": "VISA", "daily_limit": 500})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Bank account not found or unauthorized");

    let uri = format!("/api/banking/accounts/{}/cards", account_id);
    let (status, body) = send(&app, Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::GET, &uri, Some(&mallory), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_transfer_flow() {
    let (app, ctx) = create_test_app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let source = create_account(&app, &alice, "USD").await;
    let destination = create_account(&app, &bob, "USD").await;
    ctx.transfer_service
        .fund_account(source, Decimal::new(100, 0))
        .unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/banking/transfer",
        Some(&alice),
        Some(json!({
            "from_account_id": source,
            "to_account_id": destination,
            "amount": 40,
            "description": "rent"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "transfer failed: {}", body);
    assert_eq!(body["message"], "Transfer completed successfully");
    assert_eq!(body["data"]["amount"], "40.00");
    assert_eq!(body["data"]["type"], "TRANSFER");
    assert_eq!(body["data"]["status"], "COMPLETED");
    assert!(body["data"]["reference"].as_str().unwrap().starts_with("TXN"));

    let (_, body) = send(&app, Method::GET, "/api/banking/accounts", Some(&alice), None).await;
    assert_eq!(body["data"][0]["balance"], "60.00");

    let uri = format!("/api/banking/accounts/{}/transactions", destination);
    let (status, body) = send(&app, Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Transactions retrieved successfully");
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Only the owner may read an account's history
    let (status, body) = send(&app, Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized or account not found");
}

#[tokio::test]
async fn test_transfer_failures() {
    let (app, ctx) = create_test_app();
    let alice = register(&app, "alice").await;
    let mallory = register(&app, "mallory").await;
    let source = create_account(&app, &alice, "USD").await;
    let destination = create_account(&app, &alice, "USD").await;
    ctx.transfer_service
        .fund_account(source, Decimal::new(30, 0))
        .unwrap();

    let cases = [
        (&alice, source, source, 10, StatusCode::BAD_REQUEST, "Cannot transfer to the same account"),
        (&alice, source, destination, 50, StatusCode::BAD_REQUEST, "Insufficient balance"),
        (&alice, source, 424242, 10, StatusCode::NOT_FOUND, "Destination account not found"),
        (&mallory, source, destination, 10, StatusCode::UNAUTHORIZED, "Unauthorized or account not found"),
    ];

    for (token, from, to, amount, expected_status, expected_message) in cases {
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/banking/transfer",
            Some(token),
            Some(json!({"from_account_id": from, "to_account_id": to, "amount": amount})),
        )
        .await;
        assert_eq!(status, expected_status, "unexpected status for {}", expected_message);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], expected_message);
    }

    // No partial state from any of the failures
    let account = ctx.repository.find_account(source).unwrap().unwrap();
    assert_eq!(account.balance, Decimal::new(30, 0));
}
