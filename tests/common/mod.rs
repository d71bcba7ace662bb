//! Common test utilities

#![allow(dead_code)]

use axum::Router;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use bank_ledger::api::{self, AppState};
use bank_ledger::domain::{AccountType, NewAccount};
use bank_ledger::handlers::{AccountHandler, PinHandler};
use bank_ledger::iban::IbanCodec;
use bank_ledger::ledger::{AccountLedger, InMemoryLedgerStore, LedgerStore};
use bank_ledger::security::{Pin, PinHasher};

/// Low iteration count keeps hashing fast in tests
pub const TEST_HASH_ITERATIONS: u32 = 16;

pub fn memory_ledger() -> AccountLedger<InMemoryLedgerStore> {
    AccountLedger::new(InMemoryLedgerStore::new(), IbanCodec::default())
}

pub fn hasher() -> PinHasher {
    PinHasher::new(TEST_HASH_ITERATIONS)
}

/// Router over `ledger` with the full middleware stack
pub fn app<S: LedgerStore>(ledger: AccountLedger<S>) -> Router {
    api::build_router(AppState::new(ledger, hasher()))
}

pub fn pin(raw: &str) -> Pin {
    Pin::parse(raw.to_string()).unwrap()
}

/// Open and approve an account for `user_id`, then seed its balance
pub async fn seed_account<S: LedgerStore>(
    ledger: &AccountLedger<S>,
    user_id: i64,
    balance: Decimal,
) -> i64 {
    let accounts = AccountHandler::new(ledger.clone());
    let id = accounts
        .open(NewAccount {
            user_id,
            account_type: AccountType::Checking,
        })
        .await
        .unwrap()
        .id;
    accounts.approve(id).await.unwrap();

    if !balance.is_zero() {
        let account = ledger.get_by_id(id).await.unwrap();
        ledger.apply_delta(&account, balance).await.unwrap();
    }
    id
}

pub async fn seed_account_with_pin<S: LedgerStore>(
    ledger: &AccountLedger<S>,
    user_id: i64,
    balance: Decimal,
    raw_pin: &str,
) -> i64 {
    let id = seed_account(ledger, user_id, balance).await;
    PinHandler::new(ledger.clone(), hasher())
        .create_pin(id, pin(raw_pin))
        .await
        .unwrap();
    id
}

/// Setup test database - truncate tables and restart id sequences
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    // Append-only rules block DELETE, so clean up with TRUNCATE
    sqlx::query(
        "TRUNCATE TABLE card_credentials, atm_operations, transactions, accounts RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to clean up DB");

    pool
}
