//! Ledger Store
//!
//! Persistence seam for accounts, append-only records and card credentials.

use std::collections::HashSet;
use std::future::Future;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    Account, AccountLimits, AtmOperation, LedgerRecord, NewAccount, Transaction,
};
use crate::security::CardCredential;

use super::LedgerError;

/// One balance change inside a unit of work
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceDelta {
    pub account_id: i64,
    /// Version the caller validated against
    pub expected_version: i64,
    /// Signed change, `balance += delta`
    pub delta: Decimal,
}

/// An all-or-nothing unit of work: every delta plus at most one record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerWrite {
    pub deltas: Vec<BalanceDelta>,
    pub record: Option<LedgerRecord>,
}

impl LedgerWrite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a delta against the account's current version
    pub fn delta(mut self, account: &Account, delta: Decimal) -> Self {
        self.deltas.push(BalanceDelta {
            account_id: account.id(),
            expected_version: account.version(),
            delta,
        });
        self
    }

    pub fn record(mut self, record: LedgerRecord) -> Self {
        self.record = Some(record);
        self
    }

    /// Delta positions sorted by account id.
    ///
    /// Stores that take row locks apply deltas in this order so two units
    /// touching the same accounts always lock them in the same sequence.
    pub fn lock_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.deltas.len()).collect();
        order.sort_by_key(|&i| self.deltas[i].account_id);
        order
    }

    /// Each account may appear at most once per unit
    pub fn check(&self) -> Result<(), LedgerError> {
        let mut seen = HashSet::with_capacity(self.deltas.len());
        for delta in &self.deltas {
            if !seen.insert(delta.account_id) {
                return Err(LedgerError::InvalidWrite(format!(
                    "account {} appears twice",
                    delta.account_id
                )));
            }
        }
        Ok(())
    }
}

/// Status/limit change made by the account administration collaborator.
/// `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub account_id: i64,
    pub expected_version: i64,
    pub approved: Option<bool>,
    pub closed: Option<bool>,
    pub limits: Option<AccountLimits>,
}

impl StatusUpdate {
    pub fn for_account(account: &Account) -> Self {
        Self {
            account_id: account.id(),
            expected_version: account.version(),
            ..Self::default()
        }
    }
}

/// Storage backend for the ledger.
///
/// `commit` is the only way balances change. Implementations must apply a
/// `LedgerWrite` atomically and reject it as a whole when any delta's
/// `expected_version` is stale.
pub trait LedgerStore: Clone + Send + Sync + 'static {
    fn find_account(
        &self,
        account_id: i64,
    ) -> impl Future<Output = Result<Option<Account>, LedgerError>> + Send;

    fn accounts_for_user(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Vec<Account>, LedgerError>> + Send;

    fn insert_account(
        &self,
        new: NewAccount,
    ) -> impl Future<Output = Result<Account, LedgerError>> + Send;

    fn update_status(
        &self,
        update: StatusUpdate,
    ) -> impl Future<Output = Result<Account, LedgerError>> + Send;

    /// Apply a unit of work; returns the updated accounts in delta order
    fn commit(
        &self,
        write: LedgerWrite,
    ) -> impl Future<Output = Result<Vec<Account>, LedgerError>> + Send;

    fn card_credential(
        &self,
        account_id: i64,
    ) -> impl Future<Output = Result<CardCredential, LedgerError>> + Send;

    /// Store a first credential. Returns false if one already exists.
    fn insert_card_credential(
        &self,
        account_id: i64,
        hash: String,
        changed_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, LedgerError>> + Send;

    /// Replace an existing credential. Returns false if none exists.
    fn update_card_credential(
        &self,
        account_id: i64,
        hash: String,
        changed_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, LedgerError>> + Send;

    /// Transfers where any of the accounts is sender or receiver
    fn transactions_for_accounts(
        &self,
        account_ids: &[i64],
    ) -> impl Future<Output = Result<Vec<Transaction>, LedgerError>> + Send;

    fn atm_operations_for_accounts(
        &self,
        account_ids: &[i64],
    ) -> impl Future<Output = Result<Vec<AtmOperation>, LedgerError>> + Send;

    /// Sum of transfers sent by the account at or after `since`
    fn outgoing_transfer_total(
        &self,
        account_id: i64,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Decimal, LedgerError>> + Send;
}
