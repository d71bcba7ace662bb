//! Account Ledger
//!
//! Account lookup by id or IBAN on top of a `LedgerStore`, plus the single
//! balance-change primitive used outside the engines.

use rust_decimal::Decimal;

use crate::domain::{Account, AccountRole, DomainError};
use crate::error::AppError;
use crate::iban::IbanCodec;

use super::{LedgerStore, LedgerWrite};

/// How a caller refers to an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountRef {
    Id(i64),
    Iban(String),
}

impl From<i64> for AccountRef {
    fn from(id: i64) -> Self {
        AccountRef::Id(id)
    }
}

/// Account lookup and balance access
#[derive(Debug, Clone)]
pub struct AccountLedger<S> {
    store: S,
    codec: IbanCodec,
}

impl<S: LedgerStore> AccountLedger<S> {
    pub fn new(store: S, codec: IbanCodec) -> Self {
        Self { store, codec }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn codec(&self) -> &IbanCodec {
        &self.codec
    }

    /// Account by id, or `AccountNotFound`
    pub async fn get_by_id(&self, account_id: i64) -> Result<Account, AppError> {
        self.lookup(account_id, AccountRole::Account).await
    }

    /// Account by IBAN. Whitespace and case are normalised first.
    pub async fn get_by_iban(&self, iban: &str) -> Result<Account, AppError> {
        self.resolve(&AccountRef::Iban(iban.to_string()), AccountRole::Account)
            .await
    }

    /// All accounts owned by a user, ordered by id
    pub async fn get_for_user(&self, user_id: i64) -> Result<Vec<Account>, AppError> {
        Ok(self.store.accounts_for_user(user_id).await?)
    }

    /// Resolve a reference, reporting failures against `role`
    pub async fn resolve(
        &self,
        reference: &AccountRef,
        role: AccountRole,
    ) -> Result<Account, AppError> {
        match reference {
            AccountRef::Id(id) => self.lookup(*id, role).await,
            AccountRef::Iban(raw) => {
                let iban = IbanCodec::normalize(raw);
                if !self.codec.validate(&iban) {
                    return Err(DomainError::InvalidIban(raw.clone()).into());
                }

                let account_id = self.codec.extract_account_id(&iban)?;
                match self.store.find_account(account_id).await? {
                    Some(account) => Ok(account),
                    None => Err(DomainError::account_not_found(role, iban).into()),
                }
            }
        }
    }

    /// IBAN of an account id under this ledger's bank
    pub fn iban_of(&self, account_id: i64) -> Result<String, DomainError> {
        self.codec.generate(account_id)
    }

    /// Apply a signed delta to one account, guarded by the version it was
    /// read at. Writes no record.
    pub async fn apply_delta(&self, account: &Account, delta: Decimal) -> Result<Account, AppError> {
        let mut updated = self
            .store
            .commit(LedgerWrite::new().delta(account, delta))
            .await?;

        updated
            .pop()
            .ok_or_else(|| AppError::Internal("unit of work returned no account".to_string()))
    }

    async fn lookup(&self, account_id: i64, role: AccountRole) -> Result<Account, AppError> {
        match self.store.find_account(account_id).await? {
            Some(account) => Ok(account),
            None => Err(DomainError::account_not_found(role, account_id).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountType, NewAccount};
    use crate::ledger::InMemoryLedgerStore;
    use rust_decimal_macros::dec;

    async fn ledger_with_account() -> (AccountLedger<InMemoryLedgerStore>, Account) {
        let ledger = AccountLedger::new(InMemoryLedgerStore::new(), IbanCodec::default());
        let account = ledger
            .store()
            .insert_account(NewAccount {
                user_id: 5,
                account_type: AccountType::Checking,
            })
            .await
            .unwrap();
        (ledger, account)
    }

    #[tokio::test]
    async fn test_get_by_id_and_iban() {
        let (ledger, account) = ledger_with_account().await;
        let iban = ledger.iban_of(account.id()).unwrap();

        assert_eq!(ledger.get_by_id(account.id()).await.unwrap().id(), account.id());
        assert_eq!(ledger.get_by_iban(&iban).await.unwrap().id(), account.id());

        let spaced = ledger.codec().format(&iban).to_lowercase();
        assert_eq!(ledger.get_by_iban(&spaced).await.unwrap().id(), account.id());
    }

    #[tokio::test]
    async fn test_missing_account_reports_role() {
        let (ledger, _) = ledger_with_account().await;

        let err = ledger
            .resolve(&AccountRef::Id(404), AccountRole::Receiver)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::AccountNotFound {
                role: AccountRole::Receiver,
                ..
            })
        ));

        // Well-formed IBAN for an id that was never opened
        let iban = ledger.iban_of(404).unwrap();
        let err = ledger.get_by_iban(&iban).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::AccountNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_iban_is_invalid_not_missing() {
        let (ledger, _) = ledger_with_account().await;

        for raw in ["NL00BANK0000000001", "DE68BANK0000000001", "garbage"] {
            let err = ledger.get_by_iban(raw).await.unwrap_err();
            assert!(
                matches!(err, AppError::Domain(DomainError::InvalidIban(_))),
                "{raw} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_apply_delta() {
        let (ledger, account) = ledger_with_account().await;

        let updated = ledger.apply_delta(&account, dec!(75.25)).await.unwrap();
        assert_eq!(updated.balance().value(), dec!(75.25));

        // The old snapshot is now stale
        let err = ledger.apply_delta(&account, dec!(1)).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::VersionConflict(_))
        ));
    }

    #[tokio::test]
    async fn test_get_for_user() {
        let (ledger, account) = ledger_with_account().await;
        let accounts = ledger.get_for_user(5).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id(), account.id());
        assert!(ledger.get_for_user(6).await.unwrap().is_empty());
    }
}
