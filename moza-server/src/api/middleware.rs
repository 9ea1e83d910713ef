// Request middleware: bearer authentication and request ids

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{debug, info_span, Span};

use crate::api::responses::ApiError;
use crate::api::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Authenticated caller, set by [`require_auth`] for protected handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub i64);

/// Correlation id for one request, echoed back in the response
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Authentication middleware for protected routes
///
/// Resolves the `Authorization: Bearer <token>` header to a user id and puts
/// it into the request extensions. Missing, malformed or rejected tokens end
/// the request with 401 before any handler runs.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers())
        .ok_or_else(|| ApiError::unauthenticated("Missing or malformed JWT"))?;

    let user_id = state
        .ctx
        .authenticator
        .current_user_id(token)
        .map_err(|e| {
            debug!(error = %e, "Rejected bearer token");
            ApiError::from(e)
        })?;

    request.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(request).await)
}

/// Attach a request id, reusing the caller's `x-request-id` when present
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(id.clone()));
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Span for one HTTP request, carrying the id set by [`request_id`]
pub fn request_span(request: &Request) -> Span {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.as_str())
        .unwrap_or("-");
    info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

/// Extract the token from an `Authorization: Bearer <token>` header
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware::from_fn, routing::get, Extension, Router};
    use tower::ServiceExt;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(&headers_with("Bearer abc.def")), Some("abc.def"));
        assert_eq!(extract_bearer(&headers_with("bearer abc")), Some("abc"));
        assert_eq!(extract_bearer(&headers_with("Basic abc")), None);
        assert_eq!(extract_bearer(&headers_with("Bearer ")), None);
        assert_eq!(extract_bearer(&headers_with("abc")), None);
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_request_id_reaches_handlers() {
        let app = Router::new()
            .route(
                "/",
                get(|Extension(RequestId(id)): Extension<RequestId>| async move { id }),
            )
            .layer(from_fn(request_id));

        let response = app
            .oneshot(axum::http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let header = response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_string();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(header.len(), 36);
        assert_eq!(&body[..], header.as_bytes());
    }

    #[test]
    fn test_request_span_records_request_id() {
        let mut request = axum::http::Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(RequestId("req-42".to_string()));

        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = request_span(&request);
            let metadata = span.metadata().unwrap();
            assert_eq!(metadata.name(), "request");
            assert!(metadata.fields().field("request_id").is_some());
        });
    }
}
