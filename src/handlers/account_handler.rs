//! Account Handler
//!
//! Account administration: opening, approval, closing and limits. These
//! are the only transitions of an account's status flags.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{Account, AccountLimits, AccountType, DomainError, NewAccount};
use crate::error::AppError;
use crate::ledger::{AccountLedger, LedgerStore, StatusUpdate};

/// Account view with its external identifiers
#[derive(Debug, Clone, Serialize)]
pub struct AccountDetails {
    pub id: i64,
    pub user_id: i64,
    pub account_type: AccountType,
    pub iban: String,
    pub formatted_iban: String,
    pub balance: Decimal,
    pub approved: bool,
    pub closed: bool,
    pub daily_limit: Decimal,
    pub absolute_limit: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Handler for account administration
pub struct AccountHandler<S> {
    ledger: AccountLedger<S>,
}

impl<S: LedgerStore> AccountHandler<S> {
    pub fn new(ledger: AccountLedger<S>) -> Self {
        Self { ledger }
    }

    /// Open a pending account with a zero balance
    pub async fn open(&self, new: NewAccount) -> Result<AccountDetails, AppError> {
        let account = self.ledger.store().insert_account(new).await?;
        tracing::info!(
            account_id = account.id(),
            user_id = account.user_id(),
            account_type = %account.account_type(),
            "Account opened"
        );
        self.details_of(&account)
    }

    pub async fn details(&self, account_id: i64) -> Result<AccountDetails, AppError> {
        let account = self.ledger.get_by_id(account_id).await?;
        self.details_of(&account)
    }

    /// Balance without PIN; the account must be approved
    pub async fn balance(&self, account_id: i64) -> Result<Decimal, AppError> {
        let account = self.ledger.get_by_id(account_id).await?;
        account.ensure_approved()?;
        tracing::debug!(account_id, "Balance read");
        Ok(account.balance().value())
    }

    pub async fn approve(&self, account_id: i64) -> Result<AccountDetails, AppError> {
        let account = self.ledger.get_by_id(account_id).await?;
        account.ensure_open()?;

        let mut update = StatusUpdate::for_account(&account);
        update.approved = Some(true);
        let account = self.ledger.store().update_status(update).await?;

        tracing::info!(account_id, "Account approved");
        self.details_of(&account)
    }

    /// Close an account. Only allowed at a zero balance.
    pub async fn close(&self, account_id: i64) -> Result<AccountDetails, AppError> {
        let account = self.ledger.get_by_id(account_id).await?;

        let balance = account.balance().value();
        if !balance.is_zero() {
            return Err(DomainError::AccountHasBalance {
                account_id,
                balance,
            }
            .into());
        }

        let mut update = StatusUpdate::for_account(&account);
        update.closed = Some(true);
        let account = self.ledger.store().update_status(update).await?;

        tracing::info!(account_id, "Account closed");
        self.details_of(&account)
    }

    pub async fn set_limits(
        &self,
        account_id: i64,
        limits: AccountLimits,
    ) -> Result<AccountDetails, AppError> {
        let limits = AccountLimits::new(limits.daily_limit, limits.absolute_limit)?;
        let account = self.ledger.get_by_id(account_id).await?;

        let mut update = StatusUpdate::for_account(&account);
        update.limits = Some(limits);
        let account = self.ledger.store().update_status(update).await?;

        tracing::info!(
            account_id,
            daily_limit = %limits.daily_limit,
            absolute_limit = %limits.absolute_limit,
            "Account limits updated"
        );
        self.details_of(&account)
    }

    fn details_of(&self, account: &Account) -> Result<AccountDetails, AppError> {
        let iban = self.ledger.iban_of(account.id())?;
        let formatted_iban = self.ledger.codec().format(&iban);

        Ok(AccountDetails {
            id: account.id(),
            user_id: account.user_id(),
            account_type: account.account_type(),
            iban,
            formatted_iban,
            balance: account.balance().value(),
            approved: account.is_approved(),
            closed: account.is_closed(),
            daily_limit: account.limits().daily_limit,
            absolute_limit: account.limits().absolute_limit,
            created_at: account.created_at(),
        })
    }
}
