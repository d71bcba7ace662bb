//! Account Ledger
//!
//! Storage seam and account access. Two backends: PostgreSQL for
//! deployments and an in-memory store for single-process use and tests.

mod accounts;
mod error;
mod memory;
mod postgres;
mod store;

pub use accounts::{AccountLedger, AccountRef};
pub use error::LedgerError;
pub use memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;
pub use store::{BalanceDelta, LedgerStore, LedgerWrite, StatusUpdate};
