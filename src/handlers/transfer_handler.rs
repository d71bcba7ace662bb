//! Transfer Handler
//!
//! Moves money between two accounts with full validation. Id and IBAN
//! addressing share one pipeline and differ only in how accounts resolve.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    Account, AccountRole, Amount, DomainError, LedgerRecord, OperationContext, Transaction,
};
use crate::error::AppError;
use crate::ledger::{AccountLedger, LedgerStore, LedgerWrite};

use super::{TransferCommand, TransferResult};

// =========================================================================
// TransferHandler
// =========================================================================

/// Handler for account-to-account transfers
pub struct TransferHandler<S> {
    ledger: AccountLedger<S>,
}

impl<S: LedgerStore> TransferHandler<S> {
    pub fn new(ledger: AccountLedger<S>) -> Self {
        Self { ledger }
    }

    /// Execute the transfer command.
    ///
    /// Checks run in a fixed order and the first failure is returned:
    /// amount, sender, receiver, same account, approval, closed, funds,
    /// daily limit, minimum balance. Nothing is written unless all pass.
    pub async fn execute(
        &self,
        command: TransferCommand,
        context: &OperationContext,
    ) -> Result<TransferResult, AppError> {
        let amount = Amount::new(command.amount).map_err(DomainError::from)?;

        let sender = self
            .ledger
            .resolve(&command.sender, AccountRole::Sender)
            .await?;
        let receiver = self
            .ledger
            .resolve(&command.receiver, AccountRole::Receiver)
            .await?;

        if sender.id() == receiver.id() {
            return Err(DomainError::SameAccountTransfer.into());
        }

        sender.ensure_approved()?;
        receiver.ensure_approved()?;
        sender.ensure_open()?;
        receiver.ensure_open()?;
        sender.ensure_sufficient(&amount)?;

        self.check_limits(&sender, &amount).await?;

        let transaction = Transaction::transfer(
            sender.id(),
            receiver.id(),
            &amount,
            command.description_or_default(),
        );

        let write = LedgerWrite::new()
            .delta(&sender, amount.as_debit())
            .delta(&receiver, amount.as_credit())
            .record(LedgerRecord::Transfer(transaction.clone()));

        if let Err(e) = self.ledger.store().commit(write).await {
            if e.is_concurrency_conflict() {
                tracing::warn!(
                    from_account = sender.id(),
                    to_account = receiver.id(),
                    correlation_id = %context.correlation_id,
                    "Transfer aborted by concurrent modification"
                );
            }
            return Err(e.into());
        }

        tracing::info!(
            transaction_id = %transaction.id,
            from_account = sender.id(),
            to_account = receiver.id(),
            amount = %amount,
            correlation_id = %context.correlation_id,
            "Transfer completed"
        );

        Ok(TransferResult::from(transaction))
    }

    /// Transfer between accounts addressed by id
    pub async fn transfer(
        &self,
        sender_id: i64,
        receiver_id: i64,
        amount: Decimal,
        description: Option<String>,
        context: &OperationContext,
    ) -> Result<TransferResult, AppError> {
        let mut command = TransferCommand::by_id(sender_id, receiver_id, amount);
        command.description = description;
        self.execute(command, context).await
    }

    /// Transfer between accounts addressed by IBAN
    pub async fn transfer_by_iban(
        &self,
        sender_iban: &str,
        receiver_iban: &str,
        amount: Decimal,
        description: Option<String>,
        context: &OperationContext,
    ) -> Result<TransferResult, AppError> {
        let mut command = TransferCommand::by_iban(sender_iban, receiver_iban, amount);
        command.description = description;
        self.execute(command, context).await
    }

    /// Daily outgoing cap and minimum remaining balance. Zero disables either.
    async fn check_limits(&self, sender: &Account, amount: &Amount) -> Result<(), AppError> {
        let limits = sender.limits();

        if limits.has_daily_limit() {
            let spent = self
                .ledger
                .store()
                .outgoing_transfer_total(sender.id(), start_of_day(Utc::now()))
                .await?;

            if spent + amount.value() > limits.daily_limit {
                return Err(DomainError::DailyLimitExceeded {
                    limit: limits.daily_limit,
                    spent,
                    requested: amount.value(),
                }
                .into());
            }
        }

        if limits.has_minimum_balance() {
            let resulting = sender.balance().after_debit(amount);
            if resulting < limits.absolute_limit {
                return Err(DomainError::MinimumBalanceViolation {
                    minimum: limits.absolute_limit,
                    resulting,
                }
                .into());
            }
        }

        Ok(())
    }
}

/// Midnight UTC of the given instant's day
fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transfer_command() {
        let cmd = TransferCommand::by_id(1, 2, dec!(100.00))
            .with_description("Test payment".to_string());

        assert_eq!(cmd.amount, dec!(100.00));
        assert_eq!(cmd.description_or_default(), "Test payment");
    }

    #[test]
    fn test_blank_description_defaults() {
        let cmd = TransferCommand::by_id(1, 2, dec!(1)).with_description("   ".to_string());
        assert_eq!(cmd.description_or_default(), "Transfer");
        assert_eq!(TransferCommand::by_id(1, 2, dec!(1)).description_or_default(), "Transfer");
    }

    #[test]
    fn test_start_of_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 12).unwrap();
        assert_eq!(
            start_of_day(now),
            Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap()
        );
    }
}
