//! Ledger Records
//!
//! Append-only facts produced by the engines. A record is written exactly
//! once, in the same unit of work as the balance changes it describes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Amount, DomainError};

/// Transaction type. Only account-to-account transfers are recorded as
/// transactions; ATM activity has its own record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Transfer => "TRANSFER",
        }
    }
}

/// A completed account-to-account transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub from_account: i64,
    pub to_account: i64,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

impl Transaction {
    pub fn transfer(from_account: i64, to_account: i64, amount: &Amount, description: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_account,
            to_account,
            amount: amount.value(),
            transaction_type: TransactionType::Transfer,
            timestamp: Utc::now(),
            description,
        }
    }

    /// Whether the account is on either side of this transfer
    pub fn involves(&self, account_id: i64) -> bool {
        self.from_account == account_id || self.to_account == account_id
    }
}

/// ATM operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AtmOperationType {
    Deposit,
    Withdraw,
}

impl AtmOperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AtmOperationType::Deposit => "DEPOSIT",
            AtmOperationType::Withdraw => "WITHDRAW",
        }
    }

    /// Signed balance change for `amount`
    pub fn delta(&self, amount: &Amount) -> Decimal {
        match self {
            AtmOperationType::Deposit => amount.as_credit(),
            AtmOperationType::Withdraw => amount.as_debit(),
        }
    }
}

impl fmt::Display for AtmOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AtmOperationType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(AtmOperationType::Deposit),
            "WITHDRAW" => Ok(AtmOperationType::Withdraw),
            other => Err(DomainError::InvalidInput(format!(
                "unknown ATM operation type {other}"
            ))),
        }
    }
}

/// A completed ATM deposit or withdrawal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtmOperation {
    pub id: Uuid,
    pub account_id: i64,
    pub amount: Decimal,
    pub operation_type: AtmOperationType,
    pub timestamp: DateTime<Utc>,
}

impl AtmOperation {
    pub fn new(account_id: i64, amount: &Amount, operation_type: AtmOperationType) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            amount: amount.value(),
            operation_type,
            timestamp: Utc::now(),
        }
    }
}

/// The record half of a ledger unit of work
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerRecord {
    Transfer(Transaction),
    Atm(AtmOperation),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transfer_record() {
        let amount = Amount::new(dec!(25.50)).unwrap();
        let tx = Transaction::transfer(1, 2, &amount, "Rent".to_string());

        assert_eq!(tx.amount, dec!(25.50));
        assert_eq!(tx.transaction_type, TransactionType::Transfer);
        assert!(tx.involves(1));
        assert!(tx.involves(2));
        assert!(!tx.involves(3));
    }

    #[test]
    fn test_atm_delta_sign() {
        let amount = Amount::new(dec!(40)).unwrap();
        assert_eq!(AtmOperationType::Deposit.delta(&amount), dec!(40));
        assert_eq!(AtmOperationType::Withdraw.delta(&amount), dec!(-40));
    }

    #[test]
    fn test_atm_operation_type_serialization() {
        let json = serde_json::to_string(&AtmOperationType::Withdraw).unwrap();
        assert_eq!(json, r#""WITHDRAW""#);

        let parsed: AtmOperationType = serde_json::from_str(r#""DEPOSIT""#).unwrap();
        assert_eq!(parsed, AtmOperationType::Deposit);
        assert_eq!("WITHDRAW".parse::<AtmOperationType>().unwrap(), AtmOperationType::Withdraw);
        assert!("REFUND".parse::<AtmOperationType>().is_err());
    }
}
