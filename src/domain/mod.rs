//! Domain module
//!
//! Core domain types and business rules.

pub mod account;
pub mod amount;
pub mod context;
pub mod error;
pub mod records;

pub use account::{Account, AccountLimits, AccountType, NewAccount};
pub use amount::{Amount, AmountError, Balance};
pub use context::OperationContext;
pub use error::{AccountRole, DomainError, ErrorKind};
pub use records::{AtmOperation, AtmOperationType, LedgerRecord, Transaction, TransactionType};
