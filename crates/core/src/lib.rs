//! Core ledger logic for Buku.
//!
//! This crate contains the double-entry ledger with ZERO web or database
//! dependencies. Persistence goes through the [`store::LedgerStore`] seam.
//!
//! # Modules
//!
//! - `accounts` - Chart of accounts and the normal-balance rule
//! - `journal` - Journal aggregate, posting validator and reversals
//! - `balance` - Derived balances and their cache
//! - `closing` - Period closing, reopening and locking
//! - `reconciliation` - Hash-sealed snapshots and snapshot diffs
//! - `store` - Persistence seam and the in-memory store

pub mod accounts;
pub mod audit;
pub mod balance;
pub mod closing;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod reconciliation;
pub mod store;

#[cfg(test)]
mod test_support;

pub use error::{LedgerError, LedgerResult};
pub use ledger::Ledger;
pub use store::{InMemoryLedgerStore, LedgerStore, LedgerTx};
