//! PostgreSQL Ledger Store
//!
//! Balances live on the `accounts` row together with a `version` column.
//! A unit of work runs in one database transaction; every delta is applied
//! with a version-guarded UPDATE, so a stale read aborts the whole unit.
//! Rows are updated in ascending account id order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction as DbTransaction};
use uuid::Uuid;

use crate::domain::{
    Account, AccountLimits, AtmOperation, Balance, LedgerRecord, NewAccount, Transaction,
    TransactionType,
};
use crate::security::CardCredential;

use super::{LedgerError, LedgerStore, LedgerWrite, StatusUpdate};

const ACCOUNT_COLUMNS: &str = "id, user_id, account_type, balance, approved, closed, \
                               daily_limit, absolute_limit, version, created_at";

type AccountRow = (
    i64,
    i64,
    String,
    Decimal,
    bool,
    bool,
    Decimal,
    Decimal,
    i64,
    DateTime<Utc>,
);

type TransactionRow = (Uuid, i64, i64, Decimal, String, String, DateTime<Utc>);

type AtmOperationRow = (Uuid, i64, Decimal, String, DateTime<Utc>);

fn account_from_row(row: AccountRow) -> Result<Account, LedgerError> {
    let (
        id,
        user_id,
        account_type,
        balance,
        approved,
        closed,
        daily_limit,
        absolute_limit,
        version,
        created_at,
    ) = row;

    let account_type = account_type
        .parse()
        .map_err(|e: crate::domain::DomainError| LedgerError::Corrupt(e.to_string()))?;

    Ok(Account {
        id,
        user_id,
        account_type,
        balance: Balance::from_stored(balance),
        approved,
        closed,
        limits: AccountLimits {
            daily_limit,
            absolute_limit,
        },
        version,
        created_at,
    })
}

fn transaction_from_row(row: TransactionRow) -> Result<Transaction, LedgerError> {
    let (id, from_account, to_account, amount, transaction_type, description, timestamp) = row;

    if transaction_type != TransactionType::Transfer.as_str() {
        return Err(LedgerError::Corrupt(format!(
            "unknown transaction type {transaction_type}"
        )));
    }

    Ok(Transaction {
        id,
        from_account,
        to_account,
        amount,
        transaction_type: TransactionType::Transfer,
        timestamp,
        description,
    })
}

fn atm_operation_from_row(row: AtmOperationRow) -> Result<AtmOperation, LedgerError> {
    let (id, account_id, amount, operation_type, timestamp) = row;

    let operation_type = operation_type
        .parse()
        .map_err(|e: crate::domain::DomainError| LedgerError::Corrupt(e.to_string()))?;

    Ok(AtmOperation {
        id,
        account_id,
        amount,
        operation_type,
        timestamp,
    })
}

/// Ledger store backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Resolve why a guarded UPDATE matched no row
    async fn conflict_for(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        account_id: i64,
        expected: i64,
    ) -> Result<LedgerError, LedgerError> {
        let actual: Option<i64> =
            sqlx::query_scalar("SELECT version FROM accounts WHERE id = $1")
                .bind(account_id)
                .fetch_optional(&mut **tx)
                .await?;

        Ok(match actual {
            Some(actual) => LedgerError::ConcurrencyConflict {
                account_id,
                expected,
                actual,
            },
            None => LedgerError::AccountNotFound(account_id),
        })
    }

    async fn insert_record(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        record: &LedgerRecord,
    ) -> Result<(), LedgerError> {
        match record {
            LedgerRecord::Transfer(transaction) => {
                sqlx::query(
                    r#"
                    INSERT INTO transactions (
                        id, from_account_id, to_account_id, amount,
                        transaction_type, description, created_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(transaction.id)
                .bind(transaction.from_account)
                .bind(transaction.to_account)
                .bind(transaction.amount)
                .bind(transaction.transaction_type.as_str())
                .bind(&transaction.description)
                .bind(transaction.timestamp)
                .execute(&mut **tx)
                .await?;
            }
            LedgerRecord::Atm(operation) => {
                sqlx::query(
                    r#"
                    INSERT INTO atm_operations (
                        id, account_id, amount, operation_type, created_at
                    )
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(operation.id)
                .bind(operation.account_id)
                .bind(operation.amount)
                .bind(operation.operation_type.as_str())
                .bind(operation.timestamp)
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }
}

impl LedgerStore for PgLedgerStore {
    async fn find_account(&self, account_id: i64) -> Result<Option<Account>, LedgerError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(account_from_row).transpose()
    }

    async fn accounts_for_user(&self, user_id: i64) -> Result<Vec<Account>, LedgerError> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(account_from_row).collect()
    }

    async fn insert_account(&self, new: NewAccount) -> Result<Account, LedgerError> {
        let row: AccountRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO accounts (user_id, account_type)
            VALUES ($1, $2)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.account_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        account_from_row(row)
    }

    async fn update_status(&self, update: StatusUpdate) -> Result<Account, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<AccountRow> = sqlx::query_as(&format!(
            r#"
            UPDATE accounts
            SET approved = COALESCE($2, approved),
                closed = COALESCE($3, closed),
                daily_limit = COALESCE($4, daily_limit),
                absolute_limit = COALESCE($5, absolute_limit),
                version = version + 1
            WHERE id = $1 AND version = $6
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(update.account_id)
        .bind(update.approved)
        .bind(update.closed)
        .bind(update.limits.map(|l| l.daily_limit))
        .bind(update.limits.map(|l| l.absolute_limit))
        .bind(update.expected_version)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| LedgerError::from_write(e, update.account_id))?;

        let account = match row {
            Some(row) => account_from_row(row)?,
            None => {
                return Err(self
                    .conflict_for(&mut tx, update.account_id, update.expected_version)
                    .await?)
            }
        };

        tx.commit().await?;
        Ok(account)
    }

    async fn commit(&self, write: LedgerWrite) -> Result<Vec<Account>, LedgerError> {
        write.check()?;

        // Dropping `tx` on any early return rolls the unit back
        let mut tx = self.pool.begin().await?;
        let mut updated = Vec::with_capacity(write.deltas.len());

        for position in write.lock_order() {
            let delta = &write.deltas[position];
            let row: Option<AccountRow> = sqlx::query_as(&format!(
                r#"
                UPDATE accounts
                SET balance = balance + $2, version = version + 1
                WHERE id = $1 AND version = $3
                RETURNING {ACCOUNT_COLUMNS}
                "#
            ))
            .bind(delta.account_id)
            .bind(delta.delta)
            .bind(delta.expected_version)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| LedgerError::from_write(e, delta.account_id))?;

            match row {
                Some(row) => updated.push((position, account_from_row(row)?)),
                None => {
                    return Err(self
                        .conflict_for(&mut tx, delta.account_id, delta.expected_version)
                        .await?)
                }
            }
        }

        if let Some(record) = &write.record {
            self.insert_record(&mut tx, record).await?;
        }

        tx.commit().await?;

        // Callers read results in the order they listed the deltas
        updated.sort_by_key(|(position, _)| *position);
        Ok(updated.into_iter().map(|(_, account)| account).collect())
    }

    async fn card_credential(&self, account_id: i64) -> Result<CardCredential, LedgerError> {
        let row: Option<(String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT hashed_pin, last_changed
            FROM card_credentials
            WHERE account_id = $1 AND pin_created
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some((hash, last_changed)) => CardCredential::Credential { hash, last_changed },
            None => CardCredential::NoCredential,
        })
    }

    async fn insert_card_credential(
        &self,
        account_id: i64,
        hash: String,
        changed_at: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO card_credentials (account_id, hashed_pin, pin_created, last_changed)
            VALUES ($1, $2, TRUE, $3)
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(hash)
        .bind(changed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_card_credential(
        &self,
        account_id: i64,
        hash: String,
        changed_at: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE card_credentials
            SET hashed_pin = $2, last_changed = $3
            WHERE account_id = $1 AND pin_created
            "#,
        )
        .bind(account_id)
        .bind(hash)
        .bind(changed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn transactions_for_accounts(
        &self,
        account_ids: &[i64],
    ) -> Result<Vec<Transaction>, LedgerError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT id, from_account_id, to_account_id, amount,
                   transaction_type, description, created_at
            FROM transactions
            WHERE from_account_id = ANY($1) OR to_account_id = ANY($1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(account_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(transaction_from_row).collect()
    }

    async fn atm_operations_for_accounts(
        &self,
        account_ids: &[i64],
    ) -> Result<Vec<AtmOperation>, LedgerError> {
        let rows: Vec<AtmOperationRow> = sqlx::query_as(
            r#"
            SELECT id, account_id, amount, operation_type, created_at
            FROM atm_operations
            WHERE account_id = ANY($1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(account_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(atm_operation_from_row).collect()
    }

    async fn outgoing_transfer_total(
        &self,
        account_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Decimal, LedgerError> {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM transactions
            WHERE from_account_id = $1 AND created_at >= $2
            "#,
        )
        .bind(account_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountType, AtmOperationType};
    use rust_decimal_macros::dec;

    #[test]
    fn test_account_from_row() {
        let now = Utc::now();
        let account = account_from_row((
            7,
            3,
            "SAVINGS".to_string(),
            dec!(12.50),
            true,
            false,
            dec!(100),
            dec!(0),
            4,
            now,
        ))
        .unwrap();

        assert_eq!(account.id(), 7);
        assert_eq!(account.account_type(), AccountType::Savings);
        assert_eq!(account.balance().value(), dec!(12.50));
        assert!(account.limits().has_daily_limit());
        assert_eq!(account.version(), 4);
    }

    #[test]
    fn test_unknown_stored_values_are_corrupt() {
        let now = Utc::now();
        let row = (1, 1, "GOLD".to_string(), dec!(0), false, false, dec!(0), dec!(0), 0, now);
        assert!(matches!(account_from_row(row), Err(LedgerError::Corrupt(_))));

        let row = (Uuid::new_v4(), 1, dec!(5), "REFUND".to_string(), now);
        assert!(matches!(atm_operation_from_row(row), Err(LedgerError::Corrupt(_))));

        let row = (Uuid::new_v4(), 1, 2, dec!(5), "FEE".to_string(), "x".to_string(), now);
        assert!(matches!(transaction_from_row(row), Err(LedgerError::Corrupt(_))));
    }

    #[test]
    fn test_atm_operation_from_row() {
        let row = (Uuid::new_v4(), 9, dec!(20), "WITHDRAW".to_string(), Utc::now());
        let operation = atm_operation_from_row(row).unwrap();
        assert_eq!(operation.operation_type, AtmOperationType::Withdraw);
    }
}
