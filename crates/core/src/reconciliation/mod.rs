//! Cash and bank reconciliation.
//!
//! This module implements:
//! - Hash-sealed monthly snapshots of an account's posted lines
//! - Row-level diffs between two snapshots
//! - Review of the resulting differences

pub mod diff;
pub mod hash;
pub mod service;
pub mod types;


pub use diff::{RowDifference, diff_rows};
pub use hash::{SealHeader, canonical_text, seal};
pub use service::ReconciliationService;
pub use types::{
    DifferenceKind, MonthPeriod, Reconciliation, ReconciliationDifference, ReconciliationReport,
    ReconciliationSnapshot, ReconciliationStatus, ResolutionStatus, Severity, SnapshotStatus,
    TransactionSnapshot,
};
