use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::PaddleError;

pub const GENERIC_ERROR_MESSAGE: &str = "Internal server error";

/// Error returned by HTTP handlers, rendered as `{"error": ..., "status": "error"}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[inline]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Map a crate error onto a response. Only validation failures reach the
    /// client verbatim unless `expose_details` is set.
    #[inline]
    pub fn from_error(err: &PaddleError, expose_details: bool) -> Self {
        if let PaddleError::Validation(message) = err {
            return Self::bad_request(message.clone());
        }

        error!("Request failed: {}", err);
        let message = if expose_details {
            format!("An error occurred: {}", err)
        } else {
            GENERIC_ERROR_MESSAGE.to_string()
        };

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": self.message,
                "status": "error"
            })),
        )
            .into_response()
    }
}
