//! Account
//!
//! The root entity of the ledger. Balance changes only through a ledger
//! unit of work; approval, closing and limits are set by the account
//! administration collaborator.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Amount, Balance, DomainError};

/// Account product type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Checking,
    Savings,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "CHECKING",
            AccountType::Savings => "SAVINGS",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CHECKING" => Ok(AccountType::Checking),
            "SAVINGS" => Ok(AccountType::Savings),
            other => Err(DomainError::InvalidSettings(format!(
                "unknown account type {other}"
            ))),
        }
    }
}

/// Per-account transfer limits. Zero means "no limit".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountLimits {
    /// Cap on the sum of outgoing transfers per UTC day
    pub daily_limit: Decimal,
    /// Minimum balance the account must keep after a transfer
    pub absolute_limit: Decimal,
}

impl AccountLimits {
    pub fn new(daily_limit: Decimal, absolute_limit: Decimal) -> Result<Self, DomainError> {
        if daily_limit < Decimal::ZERO || absolute_limit < Decimal::ZERO {
            return Err(DomainError::InvalidSettings(
                "limits must not be negative".to_string(),
            ));
        }
        Ok(Self {
            daily_limit,
            absolute_limit,
        })
    }

    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn has_daily_limit(&self) -> bool {
        self.daily_limit > Decimal::ZERO
    }

    pub fn has_minimum_balance(&self) -> bool {
        self.absolute_limit > Decimal::ZERO
    }
}

/// Data needed to open an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub user_id: i64,
    pub account_type: AccountType,
}

/// Account entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub(crate) id: i64,
    pub(crate) user_id: i64,
    pub(crate) account_type: AccountType,
    pub(crate) balance: Balance,
    pub(crate) approved: bool,
    pub(crate) closed: bool,
    pub(crate) limits: AccountLimits,
    /// Optimistic concurrency token, bumped on every write
    pub(crate) version: i64,
    pub(crate) created_at: DateTime<Utc>,
}

impl Account {
    /// A freshly opened account: zero balance, pending approval
    pub fn open(id: i64, new: &NewAccount, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            account_type: new.account_type,
            balance: Balance::zero(),
            approved: false,
            closed: false,
            limits: AccountLimits::unlimited(),
            version: 0,
            created_at,
        }
    }

    // =========================================================================
    // Invariant checks used by the engines
    // =========================================================================

    pub fn ensure_approved(&self) -> Result<(), DomainError> {
        if !self.approved {
            return Err(DomainError::NotApproved(self.id));
        }
        Ok(())
    }

    pub fn ensure_open(&self) -> Result<(), DomainError> {
        if self.closed {
            return Err(DomainError::AccountClosed(self.id));
        }
        Ok(())
    }

    pub fn ensure_sufficient(&self, amount: &Amount) -> Result<(), DomainError> {
        if !self.balance.is_sufficient_for(amount) {
            return Err(DomainError::insufficient_funds(
                amount.value(),
                self.balance.value(),
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    pub fn balance(&self) -> &Balance {
        &self.balance
    }

    pub fn is_approved(&self) -> bool {
        self.approved
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn limits(&self) -> &AccountLimits {
        &self.limits
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
