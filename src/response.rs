//! Uniform JSON response envelope.
//!
//! Every code path, including rejections, answers with the same
//! three-field body; only `success`, `message` and the HTTP status
//! vary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::dispatch::DispatchResult;
use crate::errors::ValidationError;

pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed";
pub const NOT_FOUND_MESSAGE: &str = "Not found";
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON data received";
pub const CONFIG_FAILURE_MESSAGE: &str =
    "Email service configuration error. Please contact the administrator.";

pub struct ResponseEnvelope {
    pub status: StatusCode,
    pub result: DispatchResult,
}

impl ResponseEnvelope {
    /// 200 on delivery, 500 on a failed attempt.
    pub fn from_result(result: DispatchResult) -> Self {
        let status = if result.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self { status, result }
    }

    pub fn validation(err: ValidationError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            result: DispatchResult::failed(err.to_string()),
        }
    }

    pub fn invalid_json() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            result: DispatchResult::failed(INVALID_JSON_MESSAGE),
        }
    }

    pub fn config_failure() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            result: DispatchResult::failed(CONFIG_FAILURE_MESSAGE),
        }
    }

    pub fn method_not_allowed() -> Self {
        Self {
            status: StatusCode::METHOD_NOT_ALLOWED,
            result: DispatchResult::failed(METHOD_NOT_ALLOWED_MESSAGE),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            result: DispatchResult::failed(NOT_FOUND_MESSAGE),
        }
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        (self.status, Json(self.result)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_result() {
        assert_eq!(
            ResponseEnvelope::from_result(DispatchResult::delivered("ok")).status,
            StatusCode::OK
        );
        assert_eq!(
            ResponseEnvelope::from_result(DispatchResult::failed("no")).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ResponseEnvelope::validation(ValidationError::NameLength).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ResponseEnvelope::method_not_allowed().status,
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ResponseEnvelope::config_failure().status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
