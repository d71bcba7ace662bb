//! Command Handlers module
//!
//! Handlers that validate and execute ledger operations. Each handler
//! owns an `AccountLedger` and, where PINs are involved, a `PinHasher`.

mod account_handler;
mod atm_handler;
mod commands;
mod pin_handler;
mod transfer_handler;


pub use account_handler::{AccountDetails, AccountHandler};
pub use atm_handler::AtmHandler;
pub use commands::*;
pub use pin_handler::PinHandler;
pub use transfer_handler::TransferHandler;
