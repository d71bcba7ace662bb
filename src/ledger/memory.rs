//! In-Memory Ledger Store
//!
//! Single-process store used when no database is configured, and by the
//! test suites. All state sits behind one `RwLock`; a unit of work is
//! validated in full before anything is applied.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::{Account, AtmOperation, LedgerRecord, NewAccount, Transaction};
use crate::security::CardCredential;

use super::{LedgerError, LedgerStore, LedgerWrite, StatusUpdate};

#[derive(Debug, Default)]
struct LedgerState {
    last_account_id: i64,
    accounts: BTreeMap<i64, Account>,
    transactions: Vec<Transaction>,
    atm_operations: Vec<AtmOperation>,
    credentials: HashMap<i64, CardCredential>,
}

impl LedgerState {
    fn check_version(&self, account_id: i64, expected: i64) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get(&account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        if account.version != expected {
            return Err(LedgerError::ConcurrencyConflict {
                account_id,
                expected,
                actual: account.version,
            });
        }
        Ok(())
    }
}

/// Ledger store kept in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All transfers, oldest first
    pub async fn transactions(&self) -> Vec<Transaction> {
        self.state.read().await.transactions.clone()
    }

    /// All ATM operations, oldest first
    pub async fn atm_operations(&self) -> Vec<AtmOperation> {
        self.state.read().await.atm_operations.clone()
    }

    /// Sum of all balances
    pub async fn total_balance(&self) -> Decimal {
        self.state
            .read()
            .await
            .accounts
            .values()
            .map(|a| a.balance.value())
            .sum()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    async fn find_account(&self, account_id: i64) -> Result<Option<Account>, LedgerError> {
        Ok(self.state.read().await.accounts.get(&account_id).cloned())
    }

    async fn accounts_for_user(&self, user_id: i64) -> Result<Vec<Account>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_account(&self, new: NewAccount) -> Result<Account, LedgerError> {
        let mut state = self.state.write().await;
        state.last_account_id += 1;

        let account = Account::open(state.last_account_id, &new, Utc::now());
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn update_status(&self, update: StatusUpdate) -> Result<Account, LedgerError> {
        let mut state = self.state.write().await;
        state.check_version(update.account_id, update.expected_version)?;

        let account = state
            .accounts
            .get_mut(&update.account_id)
            .ok_or(LedgerError::AccountNotFound(update.account_id))?;

        if let Some(approved) = update.approved {
            account.approved = approved;
        }
        if let Some(closed) = update.closed {
            account.closed = closed;
        }
        if let Some(limits) = update.limits {
            account.limits = limits;
        }
        account.version += 1;

        Ok(account.clone())
    }

    async fn commit(&self, write: LedgerWrite) -> Result<Vec<Account>, LedgerError> {
        write.check()?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;

        for delta in &write.deltas {
            state.check_version(delta.account_id, delta.expected_version)?;
        }

        let mut updated = Vec::with_capacity(write.deltas.len());
        for delta in &write.deltas {
            if let Some(account) = state.accounts.get_mut(&delta.account_id) {
                account.balance = account.balance.apply_delta(delta.delta);
                account.version += 1;
                updated.push(account.clone());
            }
        }

        match write.record {
            Some(LedgerRecord::Transfer(transaction)) => state.transactions.push(transaction),
            Some(LedgerRecord::Atm(operation)) => state.atm_operations.push(operation),
            None => {}
        }

        Ok(updated)
    }

    async fn card_credential(&self, account_id: i64) -> Result<CardCredential, LedgerError> {
        Ok(self
            .state
            .read()
            .await
            .credentials
            .get(&account_id)
            .cloned()
            .unwrap_or(CardCredential::NoCredential))
    }

    async fn insert_card_credential(
        &self,
        account_id: i64,
        hash: String,
        changed_at: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let mut state = self.state.write().await;
        if state.credentials.contains_key(&account_id) {
            return Ok(false);
        }

        state.credentials.insert(
            account_id,
            CardCredential::Credential {
                hash,
                last_changed: changed_at,
            },
        );
        Ok(true)
    }

    async fn update_card_credential(
        &self,
        account_id: i64,
        hash: String,
        changed_at: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let mut state = self.state.write().await;
        match state.credentials.get_mut(&account_id) {
            Some(credential) => {
                *credential = CardCredential::Credential {
                    hash,
                    last_changed: changed_at,
                };
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn transactions_for_accounts(
        &self,
        account_ids: &[i64],
    ) -> Result<Vec<Transaction>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| account_ids.iter().any(|id| t.involves(*id)))
            .cloned()
            .collect())
    }

    async fn atm_operations_for_accounts(
        &self,
        account_ids: &[i64],
    ) -> Result<Vec<AtmOperation>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .atm_operations
            .iter()
            .rev()
            .filter(|o| account_ids.contains(&o.account_id))
            .cloned()
            .collect())
    }

    async fn outgoing_transfer_total(
        &self,
        account_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Decimal, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.from_account == account_id && t.timestamp >= since)
            .map(|t| t.amount)
            .sum())
    }
}
