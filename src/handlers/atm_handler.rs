//! ATM Handler
//!
//! PIN-authenticated deposits, withdrawals and balance enquiries.

use rust_decimal::Decimal;

use crate::domain::{
    Account, Amount, AtmOperation, AtmOperationType, DomainError, LedgerRecord, OperationContext,
};
use crate::error::AppError;
use crate::ledger::{AccountLedger, LedgerStore, LedgerWrite};
use crate::security::{Pin, PinHasher};

use super::{AtmCommand, AtmResult};

/// Handler for ATM operations
pub struct AtmHandler<S> {
    ledger: AccountLedger<S>,
    hasher: PinHasher,
}

impl<S: LedgerStore> AtmHandler<S> {
    pub fn new(ledger: AccountLedger<S>, hasher: PinHasher) -> Self {
        Self { ledger, hasher }
    }

    /// Perform a deposit or withdrawal.
    ///
    /// Order: amount, account, credential, PIN, approval, closed, then funds
    /// for withdrawals. The PIN is scrubbed as soon as it has been checked.
    pub async fn perform_operation(
        &self,
        command: AtmCommand,
        context: &OperationContext,
    ) -> Result<AtmResult, AppError> {
        let AtmCommand {
            account_id,
            amount,
            pin,
            operation_type,
        } = command;

        let amount = Amount::new(amount).map_err(DomainError::from)?;
        let account = self.authenticate(account_id, pin).await?;

        if operation_type == AtmOperationType::Withdraw {
            account.ensure_sufficient(&amount)?;
        }

        let operation = AtmOperation::new(account.id(), &amount, operation_type);
        let write = LedgerWrite::new()
            .delta(&account, operation_type.delta(&amount))
            .record(LedgerRecord::Atm(operation.clone()));

        let updated = match self.ledger.store().commit(write).await {
            Ok(mut updated) => updated.pop(),
            Err(e) => {
                if e.is_concurrency_conflict() {
                    tracing::warn!(
                        account_id,
                        operation = %operation_type,
                        correlation_id = %context.correlation_id,
                        "ATM operation aborted by concurrent modification"
                    );
                }
                return Err(e.into());
            }
        };

        let balance = updated
            .map(|a| a.balance().value())
            .ok_or_else(|| AppError::Internal("unit of work returned no account".to_string()))?;

        tracing::info!(
            operation_id = %operation.id,
            account_id,
            operation = %operation_type,
            amount = %amount,
            correlation_id = %context.correlation_id,
            "ATM operation completed"
        );

        Ok(AtmResult {
            operation_id: operation.id,
            account_id: operation.account_id,
            operation_type,
            amount: operation.amount,
            balance,
            timestamp: operation.timestamp,
        })
    }

    /// Balance after PIN authentication
    pub async fn balance_with_pin(&self, account_id: i64, pin: Pin) -> Result<Decimal, AppError> {
        let account = self.authenticate(account_id, pin).await?;
        tracing::debug!(account_id, "Balance read with PIN");
        Ok(account.balance().value())
    }

    /// ATM operations of an account, newest first
    pub async fn operations(&self, account_id: i64) -> Result<Vec<AtmOperation>, AppError> {
        let account = self.ledger.get_by_id(account_id).await?;
        Ok(self
            .ledger
            .store()
            .atm_operations_for_accounts(&[account.id()])
            .await?)
    }

    /// Account, credential, PIN, approval, closed. Consumes the PIN so it is
    /// scrubbed on every path out of here.
    async fn authenticate(&self, account_id: i64, pin: Pin) -> Result<Account, AppError> {
        let account = self.ledger.get_by_id(account_id).await?;

        let credential = self.ledger.store().card_credential(account_id).await?;
        let hash = credential.require_hash(account_id)?;

        let verified = self.hasher.verify_pin(pin, hash.to_owned()).await?;

        if !verified {
            tracing::warn!(account_id, "PIN verification failed");
            return Err(DomainError::InvalidPin.into());
        }

        account.ensure_approved()?;
        account.ensure_open()?;

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_atm_command_constructors() {
        let pin = Pin::parse("1234".to_string()).unwrap();
        let cmd = AtmCommand::withdraw(7, dec!(20), pin);
        assert_eq!(cmd.operation_type, AtmOperationType::Withdraw);
        assert_eq!(cmd.account_id, 7);

        let pin = Pin::parse("1234".to_string()).unwrap();
        let cmd = AtmCommand::deposit(7, dec!(20), pin);
        assert_eq!(cmd.operation_type, AtmOperationType::Deposit);
        assert!(!format!("{cmd:?}").contains("1234"));
    }
}
