//! `SeaORM` entities for the ledger tables.
//!
//! Status and kind columns are stored as their SCREAMING_SNAKE wire names.

pub mod accounting_periods;
pub mod accounts;
pub mod audit_log;
pub mod journal_entries;
pub mod journal_lines;
pub mod reconciliation_differences;
pub mod reconciliation_snapshots;
pub mod reconciliations;
pub mod transaction_snapshots;
