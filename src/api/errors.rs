//! API Error Handling
//!
//! Structured error responses with HTTP status codes and request tracking.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

use crate::errors::{CasinoError, StorageError};

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

/// Error body with structured information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// INVALID_WAGER, ROUND_STATE_CONFLICT, PERSISTENCE_FAILURE, ...
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    NotFound(String),
    BadRequest(String),
    InvalidWager(String),
    RoundStateConflict(String),
    PersistenceFailure(String),
    FairnessViolation(String),
    InternalError(String),
    ServiceUnavailable(String),
}

impl ApiError {
    fn new(request_id: String, kind: ApiErrorKind) -> Self {
        Self {
            kind,
            request_id,
            details: None,
        }
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self::new(request_id, ApiErrorKind::BadRequest(message))
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Map a core error onto its HTTP representation.
    pub fn from_casino(request_id: String, err: CasinoError) -> Self {
        let message = err.to_string();
        match err {
            CasinoError::InvalidWager(_) => {
                Self::new(request_id, ApiErrorKind::InvalidWager(message))
            }
            CasinoError::RoundStateConflict(_) => {
                Self::new(request_id, ApiErrorKind::RoundStateConflict(message))
            }
            CasinoError::PersistenceFailure {
                wager_id, outcome, ..
            } => {
                let details = json!({
                    "wager_id": wager_id,
                    "retryable": true,
                    "outcome_determined": outcome.is_some(),
                    "outcome": outcome,
                });
                Self::new(request_id, ApiErrorKind::PersistenceFailure(message))
                    .with_details(details)
            }
            CasinoError::FairnessViolation(_) => {
                Self::new(request_id, ApiErrorKind::FairnessViolation(message))
            }
            CasinoError::Storage(StorageError::PlayerNotFound(_)) => {
                Self::new(request_id, ApiErrorKind::NotFound(message))
            }
            CasinoError::Storage(StorageError::InsufficientFunds { .. }) => {
                Self::new(request_id, ApiErrorKind::InvalidWager(message))
            }
            CasinoError::Storage(_) => {
                Self::new(request_id, ApiErrorKind::ServiceUnavailable(message))
            }
            CasinoError::Configuration(_) => {
                Self::new(request_id, ApiErrorKind::InternalError(message))
            }
        }
    }

    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match &self.kind {
            ApiErrorKind::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiErrorKind::InvalidWager(msg) => (StatusCode::BAD_REQUEST, "INVALID_WAGER", msg),
            ApiErrorKind::RoundStateConflict(msg) => {
                (StatusCode::CONFLICT, "ROUND_STATE_CONFLICT", msg)
            }
            ApiErrorKind::PersistenceFailure(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "PERSISTENCE_FAILURE", msg)
            }
            ApiErrorKind::FairnessViolation(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "FAIRNESS_VIOLATION", msg)
            }
            ApiErrorKind::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
            ApiErrorKind::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (_, code, message) = self.parts();
        write!(f, "[{}] {}: {}", self.request_id, code, message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::warn!(request_id = %self.request_id, code, message, "request failed");
        }

        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
                details: self.details,
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CasinoError::invalid("bet"), StatusCode::BAD_REQUEST, "INVALID_WAGER"),
            (CasinoError::conflict("resolved"), StatusCode::CONFLICT, "ROUND_STATE_CONFLICT"),
            (
                CasinoError::FairnessViolation("reuse".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "FAIRNESS_VIOLATION",
            ),
            (
                CasinoError::Storage(StorageError::PlayerNotFound("p".to_string())),
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
        ];
        for (err, status, code) in cases {
            let api = ApiError::from_casino("req".to_string(), err);
            let (got_status, got_code, _) = api.parts();
            assert_eq!(got_status, status);
            assert_eq!(got_code, code);
        }
    }

    #[test]
    fn test_persistence_failure_details() {
        let api = ApiError::from_casino(
            "req-1".to_string(),
            CasinoError::PersistenceFailure {
                wager_id: "w-9".to_string(),
                reason: "ledger down".to_string(),
                outcome: None,
            },
        );
        assert_eq!(api.parts().0, StatusCode::SERVICE_UNAVAILABLE);
        let details = api.details.unwrap();
        assert_eq!(details["retryable"], true);
        assert_eq!(details["outcome_determined"], false);
        assert_eq!(details["wager_id"], "w-9");
    }
}
