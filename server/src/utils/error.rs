use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {message}")]
    Conflict { message: String, seats: Vec<String> },

    #[error("Forbidden: {message}")]
    Forbidden { message: String, seats: Vec<String> },

    #[error("Event closed: {0}")]
    EventClosed(String),

    #[error("Unavailable: {message}")]
    Unavailable { message: String, product_id: Uuid },

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    /// The named seats are actively held or sold.
    pub fn seats_taken(seats: Vec<String>) -> Self {
        AppError::Conflict {
            message: format!("Seats no longer available: {}", seats.join(", ")),
            seats,
        }
    }

    pub fn seats_forbidden(seats: Vec<String>, reason: String) -> Self {
        AppError::Forbidden {
            message: format!("Seats {} are not accessible: {}", seats.join(", "), reason),
            seats,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::EventClosed(_) => StatusCode::CONFLICT,
            AppError::Unavailable { .. } => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::Forbidden { .. } => "FORBIDDEN",
            AppError::EventClosed(_) => "EVENT_CLOSED",
            AppError::Unavailable { .. } => "UNAVAILABLE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Internal(_))
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::Conflict { seats, .. } | AppError::Forbidden { seats, .. } => {
                Some(json!({ "seats": seats }))
            }
            AppError::Unavailable { product_id, .. } => Some(json!({ "product_id": product_id })),
            _ => None,
        }
    }

    fn log(&self) {
        match self {
            AppError::Database(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::Internal(msg) => {
                error!(error = ?self, message = %msg, "Internal error");
            }
            _ => {
                warn!(code = self.code(), message = %self, "Request rejected");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        let public_message = match &self {
            AppError::InvalidInput(msg)
            | AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::EventClosed(msg) => msg.clone(),
            AppError::Conflict { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Unavailable { message, .. } => message.clone(),
            AppError::Database(_) | AppError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        };

        error_response(code, public_message, self.details(), status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_map_to_client_statuses() {
        assert_eq!(
            AppError::seats_taken(vec!["55".into()]).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::seats_forbidden(vec!["102".into()], "upgrade".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::NotFound("event".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InvalidInput("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_conflict_names_the_seats() {
        let err = AppError::seats_taken(vec!["B".into()]);
        assert!(err.to_string().contains('B'));
        assert_eq!(err.details(), Some(json!({ "seats": ["B"] })));
    }

    #[test]
    fn test_internal_errors_are_flagged() {
        assert!(AppError::Internal("boom".into()).is_internal());
        assert!(!AppError::EventClosed("over".into()).is_internal());
    }
}
