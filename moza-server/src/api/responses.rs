// Response envelope and error mapping for API endpoints

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use moza_core::Error;

/// JSON envelope shared by every endpoint
///
/// `{"status": "success"|"error", "message": ..., "data": ...}`
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Health check payload
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// Token payload returned by login
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Build a success response with the given status code
pub fn success<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    let body = Envelope {
        status: "success",
        message: message.to_string(),
        data: Some(data),
    };
    (status, Json(body)).into_response()
}

/// 200 OK success response
pub fn ok<T: Serialize>(message: &str, data: T) -> Response {
    success(StatusCode::OK, message, data)
}

/// 201 Created success response
pub fn created<T: Serialize>(message: &str, data: T) -> Response {
    success(StatusCode::CREATED, message, data)
}

/// API error type that converts domain errors to HTTP responses
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
        }
    }

    /// Attach machine-readable detail to the error body
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Envelope {
            status: "error",
            message: self.message,
            data: self.data,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidRequest(msg) => Self::bad_request(msg),
            Error::InsufficientBalance => Self::bad_request(err.to_string()),
            Error::Unauthenticated(msg) => Self::unauthenticated(msg),
            Error::InvalidCredentials | Error::Unauthorized => Self::unauthenticated(err.to_string()),
            Error::NotFoundOrUnauthorized | Error::DestinationNotFound => {
                Self::new(StatusCode::NOT_FOUND, err.to_string())
            }
            Error::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, msg),
            Error::Conflict(msg) => Self::new(StatusCode::CONFLICT, msg),
            other => {
                // Store details stay in the server log
                error!(error = %other, "Request failed");
                Self::internal()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("Invalid input").with_data(serde_json::Value::String(rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_status_mapping() {
        let cases = [
            (Error::invalid("x"), StatusCode::BAD_REQUEST),
            (Error::InsufficientBalance, StatusCode::BAD_REQUEST),
            (Error::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (Error::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (Error::Unauthorized, StatusCode::UNAUTHORIZED),
            (Error::NotFoundOrUnauthorized, StatusCode::NOT_FOUND),
            (Error::DestinationNotFound, StatusCode::NOT_FOUND),
            (Error::not_found("User not found"), StatusCode::NOT_FOUND),
            (Error::Conflict("x".into()), StatusCode::CONFLICT),
            (Error::persistence("disk full"), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Duplicate("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_messages_are_caller_facing() {
        assert_eq!(
            ApiError::from(Error::invalid("Cannot transfer to the same account")).message,
            "Cannot transfer to the same account"
        );
        assert_eq!(
            ApiError::from(Error::Unauthorized).message,
            "Unauthorized or account not found"
        );
        // Persistence details never reach the client
        assert_eq!(
            ApiError::from(Error::persistence("Constraint Error: ...")).message,
            "Internal Server Error"
        );
    }
}
