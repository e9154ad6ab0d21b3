//! JSON error responses

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::AccessError;

/// Error body returned by every endpoint
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

/// An error that renders as `{error, code}` with a matching status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self {
            retry_after: Some(retry_after_secs),
            ..Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                format!(
                    "Too many failed attempts. Try again in {} seconds",
                    retry_after_secs
                ),
            )
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Unauthorized(msg) => {
                Self::new(StatusCode::UNAUTHORIZED, "unauthorized", msg)
            }
            AccessError::Forbidden(msg) => Self::new(StatusCode::FORBIDDEN, "forbidden", msg),
            AccessError::NotFound(msg) => {
                Self::new(StatusCode::NOT_FOUND, "not_found", format!("{} not found", msg))
            }
            AccessError::Conflict(msg) => Self::new(StatusCode::CONFLICT, "conflict", msg),
            AccessError::Invalid(msg) => Self::bad_request(msg),
            other => {
                tracing::error!(error = %other, "Request failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            code: self.code,
        };
        let mut response = (self.status, Json(body)).into_response();

        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AccessError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AccessError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AccessError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AccessError::Conflict("x".into()), StatusCode::CONFLICT),
            (AccessError::Invalid("x".into()), StatusCode::BAD_REQUEST),
            (
                AccessError::Storage(StorageError::Unavailable("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::rate_limited(42).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
