//! The `{success, ...}` response envelope

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{error, warn};

use crate::error::Error;

/// A failed request, already reduced to what the caller may see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Reduce `err` for the caller. Internal details stay in the server log.
    pub fn from_error(err: Error, operation: &str) -> Self {
        if err.is_caller_facing() {
            warn!(kind = err.kind(), operation, error = %err, "request rejected");
            return Self::new(err.status(), err.to_string());
        }

        error!(kind = err.kind(), operation, error = %err, "request failed");
        Self::new(err.status(), format!("An error occurred while {}", operation))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

/// Attach the operation name used in generic failure messages
pub trait During<T> {
    fn during(self, operation: &str) -> Result<T, ApiError>;
}

impl<T> During<T> for Result<T, Error> {
    fn during(self, operation: &str) -> Result<T, ApiError> {
        self.map_err(|err| ApiError::from_error(err, operation))
    }
}

/// Wrap a serializable object payload as `{success: true, ...payload}`
pub fn success<T: Serialize>(payload: &T) -> Result<Json<Value>, ApiError> {
    let mut body = match serde_json::to_value(payload) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
        Err(e) => {
            error!(error = %e, "failed to serialize response");
            return Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred while preparing the response",
            ));
        }
    };
    body.insert("success".to_string(), Value::Bool(true));
    Ok(Json(Value::Object(body)))
}
