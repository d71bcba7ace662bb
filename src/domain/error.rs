//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;

/// Which side of a transfer an account sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRole {
    Sender,
    Receiver,
    Account,
}

impl std::fmt::Display for AccountRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountRole::Sender => write!(f, "sender"),
            AccountRole::Receiver => write!(f, "receiver"),
            AccountRole::Account => write!(f, "account"),
        }
    }
}

/// Failure category, used by the boundary for transport-level mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before storage was touched
    Validation,
    NotFound,
    /// Credential, status or funds check failed
    Authorization,
    /// Concurrent modification or state conflict
    Conflict,
}

/// Business rule violations raised by the engines.
///
/// Each variant is raised exactly where the violation is detected and is
/// passed unmodified to the caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Zero, negative, over-precise or oversized amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// PIN is not exactly 4 decimal digits
    #[error("PIN must be exactly 4 digits")]
    InvalidPinFormat,

    /// IBAN failed checksum or structure validation
    #[error("Invalid IBAN: {0}")]
    InvalidIban(String),

    /// Malformed input to the IBAN codec
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid limit or account type on an administrative update
    #[error("Invalid account settings: {0}")]
    InvalidSettings(String),

    /// Account does not exist
    #[error("{role} account not found: {reference}")]
    AccountNotFound { role: AccountRole, reference: String },

    /// No PIN has been set for the account
    #[error("No PIN set for account {0}")]
    CredentialNotFound(i64),

    /// PIN verification failed
    #[error("Invalid PIN")]
    InvalidPin,

    /// Account has not been approved yet
    #[error("Account {0} is not approved")]
    NotApproved(i64),

    /// Account is closed
    #[error("Account {0} is closed")]
    AccountClosed(i64),

    /// Insufficient balance for debit operation
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    /// Sum of today's outgoing transfers would exceed the daily limit
    #[error("Daily transfer limit exceeded: limit {limit}, already sent {spent}, requested {requested}")]
    DailyLimitExceeded {
        limit: Decimal,
        spent: Decimal,
        requested: Decimal,
    },

    /// Sender would fall below its minimum balance
    #[error("Minimum balance violation: minimum {minimum}, resulting {resulting}")]
    MinimumBalanceViolation { minimum: Decimal, resulting: Decimal },

    /// Transfer to same account
    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    /// createPin on an account that already has one
    #[error("PIN already set for account {0}")]
    PinAlreadySet(i64),

    /// Closing an account that still holds money
    #[error("Account {account_id} must have zero balance to be closed (balance {balance})")]
    AccountHasBalance { account_id: i64, balance: Decimal },

    /// Optimistic lock failure
    #[error("Concurrent modification of account {0}")]
    VersionConflict(i64),
}

impl DomainError {
    /// Create an account-not-found error
    pub fn account_not_found(role: AccountRole, reference: impl ToString) -> Self {
        Self::AccountNotFound {
            role,
            reference: reference.to_string(),
        }
    }

    /// Create an insufficient funds error
    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds { required, available }
    }

    /// Category of this failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount(_)
            | Self::InvalidPinFormat
            | Self::InvalidIban(_)
            | Self::InvalidInput(_)
            | Self::InvalidSettings(_)
            | Self::SameAccountTransfer => ErrorKind::Validation,

            Self::AccountNotFound { .. } | Self::CredentialNotFound(_) => ErrorKind::NotFound,

            Self::InvalidPin
            | Self::NotApproved(_)
            | Self::AccountClosed(_)
            | Self::InsufficientFunds { .. }
            | Self::DailyLimitExceeded { .. }
            | Self::MinimumBalanceViolation { .. } => ErrorKind::Authorization,

            Self::PinAlreadySet(_) | Self::AccountHasBalance { .. } | Self::VersionConflict(_) => {
                ErrorKind::Conflict
            }
        }
    }
}

impl From<super::AmountError> for DomainError {
    fn from(err: super::AmountError) -> Self {
        Self::InvalidAmount(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_funds_error() {
        let err = DomainError::insufficient_funds(dec!(100), dec!(50));

        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn test_not_found_names_the_side() {
        let err = DomainError::account_not_found(AccountRole::Receiver, 42);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "receiver account not found: 42");
    }

    #[test]
    fn test_validation_kinds() {
        assert_eq!(
            DomainError::InvalidAmount("zero".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(DomainError::InvalidPinFormat.kind(), ErrorKind::Validation);
        assert_eq!(DomainError::SameAccountTransfer.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_version_conflict_error() {
        let err = DomainError::VersionConflict(7);

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "Concurrent modification of account 7");
    }

    #[test]
    fn test_amount_error_conversion() {
        let err: DomainError = crate::domain::Amount::new(dec!(0)).unwrap_err().into();
        assert!(matches!(err, DomainError::InvalidAmount(_)));
    }
}
