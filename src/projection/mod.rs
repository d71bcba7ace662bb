//! Projection module
//!
//! Read models derived from the append-only ledger records.

mod history;

pub use history::{EntryKind, HistoryEntry, HistoryFilter, HistoryScope, HistoryService};
