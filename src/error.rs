//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::{AccountRole, DomainError, ErrorKind};
use crate::ledger::LedgerError;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::ConcurrencyConflict { account_id, .. }
            | LedgerError::Aborted { account_id, .. } => {
                AppError::Domain(DomainError::VersionConflict(account_id))
            }
            LedgerError::AccountNotFound(id) => {
                AppError::Domain(DomainError::account_not_found(AccountRole::Account, id))
            }
            LedgerError::Database(e) => AppError::Database(e),
            LedgerError::InvalidWrite(msg) | LedgerError::Corrupt(msg) => AppError::Internal(msg),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("blocking task failed: {err}"))
    }
}

impl AppError {
    /// Domain failure carried by this error, if any
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            AppError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Stable machine-readable code for a domain failure
fn domain_error_code(err: &DomainError) -> &'static str {
    match err {
        DomainError::InvalidAmount(_) => "invalid_amount",
        DomainError::InvalidPinFormat => "invalid_pin_format",
        DomainError::InvalidIban(_) => "invalid_iban",
        DomainError::InvalidInput(_) => "invalid_input",
        DomainError::InvalidSettings(_) => "invalid_settings",
        DomainError::AccountNotFound { .. } => "account_not_found",
        DomainError::CredentialNotFound(_) => "credential_not_found",
        DomainError::InvalidPin => "invalid_pin",
        DomainError::NotApproved(_) => "account_not_approved",
        DomainError::AccountClosed(_) => "account_closed",
        DomainError::InsufficientFunds { .. } => "insufficient_funds",
        DomainError::DailyLimitExceeded { .. } => "daily_limit_exceeded",
        DomainError::MinimumBalanceViolation { .. } => "minimum_balance_violation",
        DomainError::SameAccountTransfer => "same_account_transfer",
        DomainError::PinAlreadySet(_) => "pin_already_set",
        DomainError::AccountHasBalance { .. } => "account_has_balance",
        DomainError::VersionConflict(_) => "version_conflict",
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::InvalidPin => StatusCode::UNAUTHORIZED,
        DomainError::InsufficientFunds { .. }
        | DomainError::DailyLimitExceeded { .. }
        | DomainError::MinimumBalanceViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
        },
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            // Domain errors - map by category
            AppError::Domain(domain_err) => {
                (domain_status(domain_err), domain_error_code(domain_err), None)
            }

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        // Server-side failure text stays in the logs
        let error = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_domain_status_mapping() {
        assert_eq!(
            status_of(DomainError::InvalidAmount("x".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::account_not_found(AccountRole::Sender, 1).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(DomainError::InvalidPin.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(DomainError::NotApproved(1).into()), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(DomainError::insufficient_funds(dec!(2), dec!(1)).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_of(DomainError::PinAlreadySet(1).into()), StatusCode::CONFLICT);
        assert_eq!(status_of(DomainError::VersionConflict(1).into()), StatusCode::CONFLICT);
    }

    #[test]
    fn test_ledger_error_conversion() {
        let err: AppError = LedgerError::ConcurrencyConflict {
            account_id: 3,
            expected: 1,
            actual: 2,
        }
        .into();
        assert!(matches!(err.domain(), Some(DomainError::VersionConflict(3))));

        let err: AppError = LedgerError::Aborted {
            account_id: 5,
            sqlstate: "40P01".to_string(),
        }
        .into();
        assert!(matches!(err.domain(), Some(DomainError::VersionConflict(5))));
        assert_eq!(status_of(err), StatusCode::CONFLICT);

        let err: AppError = LedgerError::Corrupt("bad row".into()).into();
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_request() {
        assert_eq!(
            status_of(AppError::InvalidRequest("missing".into())),
            StatusCode::BAD_REQUEST
        );
    }
}
