//! Command definitions
//!
//! Commands represent intentions to change the system state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{AtmOperationType, Transaction};
use crate::ledger::AccountRef;
use crate::security::Pin;

/// Description stored when a transfer has none
pub const DEFAULT_TRANSFER_DESCRIPTION: &str = "Transfer";

// =========================================================================
// TransferCommand
// =========================================================================

/// Command to move money between two accounts. Either side may be given
/// by id or by IBAN; both paths run the same validation.
#[derive(Debug, Clone)]
pub struct TransferCommand {
    pub sender: AccountRef,
    pub receiver: AccountRef,
    pub amount: Decimal,
    pub description: Option<String>,
}

impl TransferCommand {
    pub fn new(sender: AccountRef, receiver: AccountRef, amount: Decimal) -> Self {
        Self {
            sender,
            receiver,
            amount,
            description: None,
        }
    }

    pub fn by_id(sender_id: i64, receiver_id: i64, amount: Decimal) -> Self {
        Self::new(AccountRef::Id(sender_id), AccountRef::Id(receiver_id), amount)
    }

    pub fn by_iban(sender_iban: &str, receiver_iban: &str, amount: Decimal) -> Self {
        Self::new(
            AccountRef::Iban(sender_iban.to_string()),
            AccountRef::Iban(receiver_iban.to_string()),
            amount,
        )
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    /// Stored description; blank input falls back to the default
    pub fn description_or_default(&self) -> String {
        match self.description.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => DEFAULT_TRANSFER_DESCRIPTION.to_string(),
        }
    }
}

/// Transfer result
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub transaction_id: Uuid,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: Decimal,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

impl From<Transaction> for TransferResult {
    fn from(tx: Transaction) -> Self {
        Self {
            transaction_id: tx.id,
            from_account_id: tx.from_account,
            to_account_id: tx.to_account,
            amount: tx.amount,
            description: tx.description,
            timestamp: tx.timestamp,
            status: "completed".to_string(),
        }
    }
}

// =========================================================================
// AtmCommand
// =========================================================================

/// Command for a PIN-authenticated deposit or withdrawal
#[derive(Debug)]
pub struct AtmCommand {
    pub account_id: i64,
    pub amount: Decimal,
    pub pin: Pin,
    pub operation_type: AtmOperationType,
}

impl AtmCommand {
    pub fn deposit(account_id: i64, amount: Decimal, pin: Pin) -> Self {
        Self {
            account_id,
            amount,
            pin,
            operation_type: AtmOperationType::Deposit,
        }
    }

    pub fn withdraw(account_id: i64, amount: Decimal, pin: Pin) -> Self {
        Self {
            account_id,
            amount,
            pin,
            operation_type: AtmOperationType::Withdraw,
        }
    }
}

/// ATM operation result
#[derive(Debug, Clone, Serialize)]
pub struct AtmResult {
    pub operation_id: Uuid,
    pub account_id: i64,
    pub operation_type: AtmOperationType,
    pub amount: Decimal,
    pub balance: Decimal,
    pub timestamp: DateTime<Utc>,
}
