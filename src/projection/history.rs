//! History Service
//!
//! Read model that merges transfers and ATM operations of one or more
//! accounts into a single timeline, newest first.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AccountRole, AtmOperation, AtmOperationType, Transaction};
use crate::error::AppError;
use crate::iban::IbanCodec;
use crate::ledger::{AccountLedger, AccountRef, LedgerStore};

/// Whose history to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryScope {
    Account(i64),
    /// Every account the user owns
    User(i64),
    Iban(String),
}

/// Kind of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    Transfer,
    Deposit,
    Withdraw,
}

impl From<AtmOperationType> for EntryKind {
    fn from(operation_type: AtmOperationType) -> Self {
        match operation_type {
            AtmOperationType::Deposit => EntryKind::Deposit,
            AtmOperationType::Withdraw => EntryKind::Withdraw,
        }
    }
}

/// One line of a unified history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_account: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_iban: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_account: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_iban: Option<String>,
}

/// Optional filters, all bounds inclusive
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HistoryFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

impl HistoryFilter {
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        let day = entry.timestamp.date_naive();

        self.start_date.map_or(true, |start| day >= start)
            && self.end_date.map_or(true, |end| day <= end)
            && self.min_amount.map_or(true, |min| entry.amount >= min)
            && self.max_amount.map_or(true, |max| entry.amount <= max)
    }
}

/// Unified history over a ledger store
pub struct HistoryService<S> {
    ledger: AccountLedger<S>,
}

impl<S: LedgerStore> HistoryService<S> {
    pub fn new(ledger: AccountLedger<S>) -> Self {
        Self { ledger }
    }

    /// Entries for the scope, filtered and sorted newest first. Entries with
    /// equal timestamps keep their fetch order.
    pub async fn history(
        &self,
        scope: HistoryScope,
        filter: &HistoryFilter,
    ) -> Result<Vec<HistoryEntry>, AppError> {
        let account_ids = self.account_ids(scope).await?;
        if account_ids.is_empty() {
            return Ok(Vec::new());
        }

        let store = self.ledger.store();
        let transactions = store.transactions_for_accounts(&account_ids).await?;
        let operations = store.atm_operations_for_accounts(&account_ids).await?;

        let codec = self.ledger.codec();
        let mut entries: Vec<HistoryEntry> = transactions
            .iter()
            .map(|t| transfer_entry(codec, t))
            .chain(operations.iter().map(|o| atm_entry(codec, o)))
            .filter(|e| filter.matches(e))
            .collect();

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        tracing::debug!(
            accounts = account_ids.len(),
            entries = entries.len(),
            "History assembled"
        );
        Ok(entries)
    }

    async fn account_ids(&self, scope: HistoryScope) -> Result<Vec<i64>, AppError> {
        match scope {
            HistoryScope::Account(id) => Ok(vec![self.ledger.get_by_id(id).await?.id()]),
            HistoryScope::Iban(iban) => {
                let account = self
                    .ledger
                    .resolve(&AccountRef::Iban(iban), AccountRole::Account)
                    .await?;
                Ok(vec![account.id()])
            }
            HistoryScope::User(user_id) => Ok(self
                .ledger
                .get_for_user(user_id)
                .await?
                .iter()
                .map(|a| a.id())
                .collect()),
        }
    }
}

fn transfer_entry(codec: &IbanCodec, transaction: &Transaction) -> HistoryEntry {
    HistoryEntry {
        id: transaction.id,
        kind: EntryKind::Transfer,
        amount: transaction.amount,
        timestamp: transaction.timestamp,
        description: transaction.description.clone(),
        from_account: Some(transaction.from_account),
        from_iban: codec.generate(transaction.from_account).ok(),
        to_account: Some(transaction.to_account),
        to_iban: codec.generate(transaction.to_account).ok(),
    }
}

fn atm_entry(codec: &IbanCodec, operation: &AtmOperation) -> HistoryEntry {
    let iban = codec.generate(operation.account_id).ok();
    let (from_account, from_iban, to_account, to_iban) = match operation.operation_type {
        AtmOperationType::Deposit => (None, None, Some(operation.account_id), iban),
        AtmOperationType::Withdraw => (Some(operation.account_id), iban, None, None),
    };

    HistoryEntry {
        id: operation.id,
        kind: operation.operation_type.into(),
        amount: operation.amount,
        timestamp: operation.timestamp,
        description: format!("ATM {}", operation.operation_type),
        from_account,
        from_iban,
        to_account,
        to_iban,
    }
}
