//! Ledger Store Errors

/// SQLSTATE raised when PostgreSQL breaks a lock cycle
const DEADLOCK_DETECTED: &str = "40P01";

/// SQLSTATE raised when a transaction cannot be serialized
const SERIALIZATION_FAILURE: &str = "40001";

/// Errors that can occur in a ledger store
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Optimistic concurrency conflict; the whole unit of work was discarded
    #[error("Concurrency conflict for account {account_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        account_id: i64,
        expected: i64,
        actual: i64,
    },

    /// The database aborted the unit while it was writing `account_id`
    #[error("Transaction on account {account_id} aborted by the database (SQLSTATE {sqlstate})")]
    Aborted { account_id: i64, sqlstate: String },

    /// Account referenced by a write does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    /// A unit of work that cannot be applied as written
    #[error("Invalid unit of work: {0}")]
    InvalidWrite(String),

    /// Stored data that does not map back to the domain
    #[error("Corrupt ledger data: {0}")]
    Corrupt(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl LedgerError {
    /// Check if this error is a concurrency conflict
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            LedgerError::ConcurrencyConflict { .. } | LedgerError::Aborted { .. }
        )
    }

    /// Classify a failed write against `account_id`.
    ///
    /// Deadlock and serialization aborts lose to a concurrent unit the same
    /// way a stale version does; anything else stays a database error.
    pub fn from_write(err: sqlx::Error, account_id: i64) -> Self {
        let sqlstate = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned());

        match sqlstate {
            Some(sqlstate) if is_transient_abort(&sqlstate) => {
                LedgerError::Aborted { account_id, sqlstate }
            }
            _ => LedgerError::Database(err),
        }
    }
}

fn is_transient_abort(sqlstate: &str) -> bool {
    sqlstate == DEADLOCK_DETECTED || sqlstate == SERIALIZATION_FAILURE
}
