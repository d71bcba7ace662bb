//! Shared application state

use crate::handlers::{AccountHandler, AtmHandler, PinHandler, TransferHandler};
use crate::ledger::{AccountLedger, LedgerStore};
use crate::projection::HistoryService;
use crate::security::PinHasher;

/// State handed to every route. Handlers are built per request.
#[derive(Debug, Clone)]
pub struct AppState<S> {
    pub ledger: AccountLedger<S>,
    pub hasher: PinHasher,
}

impl<S: LedgerStore> AppState<S> {
    pub fn new(ledger: AccountLedger<S>, hasher: PinHasher) -> Self {
        Self { ledger, hasher }
    }

    pub fn transfers(&self) -> TransferHandler<S> {
        TransferHandler::new(self.ledger.clone())
    }

    pub fn atm(&self) -> AtmHandler<S> {
        AtmHandler::new(self.ledger.clone(), self.hasher)
    }

    pub fn pins(&self) -> PinHandler<S> {
        PinHandler::new(self.ledger.clone(), self.hasher)
    }

    pub fn accounts(&self) -> AccountHandler<S> {
        AccountHandler::new(self.ledger.clone())
    }

    pub fn history(&self) -> HistoryService<S> {
        HistoryService::new(self.ledger.clone())
    }
}
