//! PIN Handler
//!
//! Card credential lifecycle: status, first PIN, change, verification.

use chrono::Utc;

use crate::domain::DomainError;
use crate::error::AppError;
use crate::ledger::{AccountLedger, LedgerStore};
use crate::security::{Pin, PinHasher};

/// Handler for card PIN management
pub struct PinHandler<S> {
    ledger: AccountLedger<S>,
    hasher: PinHasher,
}

impl<S: LedgerStore> PinHandler<S> {
    pub fn new(ledger: AccountLedger<S>, hasher: PinHasher) -> Self {
        Self { ledger, hasher }
    }

    /// Whether the account has a PIN. Needs no PIN itself.
    pub async fn pin_status(&self, account_id: i64) -> Result<bool, AppError> {
        self.ledger.get_by_id(account_id).await?;
        let credential = self.ledger.store().card_credential(account_id).await?;
        Ok(credential.is_set())
    }

    /// Set the first PIN of an account
    pub async fn create_pin(&self, account_id: i64, pin: Pin) -> Result<(), AppError> {
        self.ledger.get_by_id(account_id).await?;

        if self.ledger.store().card_credential(account_id).await?.is_set() {
            return Err(DomainError::PinAlreadySet(account_id).into());
        }

        let hash = self.hasher.hash_pin(pin).await?;

        let inserted = self
            .ledger
            .store()
            .insert_card_credential(account_id, hash, Utc::now())
            .await?;

        if !inserted {
            return Err(DomainError::PinAlreadySet(account_id).into());
        }

        tracing::info!(account_id, "PIN created");
        Ok(())
    }

    /// Replace the PIN after verifying the current one
    pub async fn change_pin(
        &self,
        account_id: i64,
        current: Pin,
        new_pin: Pin,
    ) -> Result<(), AppError> {
        self.ledger.get_by_id(account_id).await?;

        let credential = self.ledger.store().card_credential(account_id).await?;
        let stored = credential.require_hash(account_id)?;

        let verified = self.hasher.verify_pin(current, stored.to_owned()).await?;

        if !verified {
            tracing::warn!(account_id, "PIN change rejected: current PIN mismatch");
            return Err(DomainError::InvalidPin.into());
        }

        let hash = self.hasher.hash_pin(new_pin).await?;

        let updated = self
            .ledger
            .store()
            .update_card_credential(account_id, hash, Utc::now())
            .await?;

        if !updated {
            return Err(DomainError::CredentialNotFound(account_id).into());
        }

        tracing::info!(account_id, "PIN changed");
        Ok(())
    }

    /// Check a PIN without performing any operation
    pub async fn verify_pin(&self, account_id: i64, pin: Pin) -> Result<bool, AppError> {
        self.ledger.get_by_id(account_id).await?;

        let credential = self.ledger.store().card_credential(account_id).await?;
        let stored = credential.require_hash(account_id)?;

        let verified = self.hasher.verify_pin(pin, stored.to_owned()).await?;
        if !verified {
            tracing::warn!(account_id, "PIN verification failed");
        }
        Ok(verified)
    }
}
