//! Ledger error types.
//!
//! Every ledger operation fails with one of these. Validation failures are
//! raised before commit, so a returned error never leaves partial writes.

use buku_shared::AppError;
use buku_shared::types::{AccountId, JournalEntryId, PeriodId, SnapshotId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // ========== Journal Errors ==========
    /// A journal entry needs at least two lines.
    #[error("Journal entry needs at least 2 lines, got {0}")]
    EmptyLines(usize),

    /// A line carries an invalid amount combination.
    #[error("Line {line} is invalid: {reason}")]
    InvalidLine {
        /// 1-based line number.
        line: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// Debits and credits differ.
    #[error("Journal entry is not balanced. Debit: {debit}, Credit: {credit}")]
    Unbalanced {
        /// Sum of line debits.
        debit: Decimal,
        /// Sum of line credits.
        credit: Decimal,
    },

    /// A referenced account is missing, inactive, a header, or of the wrong type.
    #[error("Account {account_id} cannot be used: {reason}")]
    InvalidAccount {
        /// The rejected account.
        account_id: AccountId,
        /// Why it was rejected.
        reason: String,
    },

    /// The entry was already reversed once.
    #[error("Journal entry {0} has already been reversed")]
    AlreadyReversed(JournalEntryId),

    // ========== Period Errors ==========
    /// The date falls inside a closed or locked period, or the period is hard-locked.
    #[error("Period {start} to {end} is locked")]
    PeriodLocked {
        /// First day of the blocking period.
        start: NaiveDate,
        /// Last day of the blocking period.
        end: NaiveDate,
    },

    /// The range overlaps an existing closed period.
    #[error("Range overlaps closed period {start} to {end}")]
    AlreadyClosed {
        /// First day of the overlapping period.
        start: NaiveDate,
        /// Last day of the overlapping period.
        end: NaiveDate,
    },

    /// No posted entries exist in the range.
    #[error("Nothing to close between {start} and {end}")]
    NothingToClose {
        /// First day of the range.
        start: NaiveDate,
        /// Last day of the range.
        end: NaiveDate,
    },

    /// Posted entries within the range do not balance in aggregate.
    #[error("Ledger is unbalanced in range. Debit: {debit}, Credit: {credit}")]
    UnbalancedLedger {
        /// Total debits in range.
        debit: Decimal,
        /// Total credits in range.
        credit: Decimal,
    },

    /// DRAFT entries dated in the range would be stranded by the close.
    #[error("Found {count} draft entries between {start} and {end}, post or discard them first")]
    DraftsInRange {
        /// First day of the range.
        start: NaiveDate,
        /// Last day of the range.
        end: NaiveDate,
        /// Drafts dated in the range.
        count: u64,
    },

    /// Revenue or expense posted before the range was never closed.
    #[error("Revenue and expense posted before {before} are not closed yet")]
    UnclosedPriorActivity {
        /// Start of the requested range.
        before: NaiveDate,
    },

    /// A later period is still closed.
    #[error("Cannot reopen: newer period {0} is still closed")]
    NewerPeriodClosed(PeriodId),

    /// The period is already hard-locked.
    #[error("Period {0} is already locked")]
    AlreadyLocked(PeriodId),

    /// Start date after end date.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange {
        /// Requested start.
        start: NaiveDate,
        /// Requested end.
        end: NaiveDate,
    },

    // ========== Reconciliation Errors ==========
    /// The snapshot is locked and its frozen rows cannot be rewritten.
    #[error("Snapshot {0} is locked")]
    SnapshotLocked(SnapshotId),

    /// A stored hash no longer matches the frozen rows.
    #[error("Snapshot {snapshot_id} failed integrity check: stored {stored}, computed {computed}")]
    IntegrityViolation {
        /// The tampered snapshot.
        snapshot_id: SnapshotId,
        /// Hash sealed at capture time.
        stored: String,
        /// Hash recomputed now.
        computed: String,
    },

    /// The reconciliation period label is not `YYYY-MM`.
    #[error("Invalid period label: {0}")]
    InvalidPeriod(String),

    // ========== Chart of Accounts Errors ==========
    /// An active account already uses the code.
    #[error("Account code {0} already exists")]
    DuplicateCode(String),

    /// The parent link is not allowed.
    #[error("Invalid account hierarchy: {0}")]
    InvalidHierarchy(String),

    /// The account still carries a balance.
    #[error("Account {account_id} has a non-zero balance of {balance}")]
    HasBalance {
        /// The account.
        account_id: AccountId,
        /// Its current balance.
        balance: Decimal,
    },

    /// The account still has active children.
    #[error("Account {0} still has active child accounts")]
    HasActiveChildren(AccountId),

    /// The account is system-critical and cannot be restructured.
    #[error("Account {0} is system-critical")]
    SystemCritical(AccountId),

    // ========== General Errors ==========
    /// Record not found.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Lookup key.
        key: String,
    },

    /// The record is not in a state that allows the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    // ========== Storage Errors ==========
    /// Lock timeout, deadlock or serialization failure in the store.
    #[error("Concurrent modification, please retry: {0}")]
    Concurrency(String),

    /// Any other store failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Shorthand for a missing record.
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Shorthand for an unusable account.
    pub fn invalid_account(account_id: AccountId, reason: impl Into<String>) -> Self {
        Self::InvalidAccount {
            account_id,
            reason: reason.into(),
        }
    }

    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyLines(_) => "EMPTY_LINES",
            Self::InvalidLine { .. } => "INVALID_LINE",
            Self::Unbalanced { .. } => "UNBALANCED",
            Self::InvalidAccount { .. } => "INVALID_ACCOUNT",
            Self::AlreadyReversed(_) => "ALREADY_REVERSED",
            Self::PeriodLocked { .. } => "PERIOD_LOCKED",
            Self::AlreadyClosed { .. } => "ALREADY_CLOSED",
            Self::NothingToClose { .. } => "NOTHING_TO_CLOSE",
            Self::UnbalancedLedger { .. } => "UNBALANCED_LEDGER",
            Self::DraftsInRange { .. } => "DRAFTS_IN_RANGE",
            Self::UnclosedPriorActivity { .. } => "UNCLOSED_PRIOR_ACTIVITY",
            Self::NewerPeriodClosed(_) => "NEWER_PERIOD_CLOSED",
            Self::AlreadyLocked(_) => "ALREADY_LOCKED",
            Self::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            Self::SnapshotLocked(_) => "SNAPSHOT_LOCKED",
            Self::IntegrityViolation { .. } => "INTEGRITY_VIOLATION",
            Self::InvalidPeriod(_) => "INVALID_PERIOD",
            Self::DuplicateCode(_) => "DUPLICATE_CODE",
            Self::InvalidHierarchy(_) => "INVALID_HIERARCHY",
            Self::HasBalance { .. } => "HAS_BALANCE",
            Self::HasActiveChildren(_) => "HAS_ACTIVE_CHILDREN",
            Self::SystemCritical(_) => "SYSTEM_CRITICAL",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Concurrency(_) => "CONCURRENT_MODIFICATION",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::EmptyLines(_)
            | Self::InvalidLine { .. }
            | Self::InvalidDateRange { .. }
            | Self::InvalidPeriod(_)
            | Self::Validation(_) => 400,

            // 404 Not Found
            Self::NotFound { .. } => 404,

            // 409 Conflict - clashes with existing state
            Self::DuplicateCode(_)
            | Self::AlreadyClosed { .. }
            | Self::AlreadyLocked(_)
            | Self::AlreadyReversed(_)
            | Self::IntegrityViolation { .. }
            | Self::Concurrency(_) => 409,

            // 422 Unprocessable - business rule violations
            Self::Unbalanced { .. }
            | Self::InvalidAccount { .. }
            | Self::PeriodLocked { .. }
            | Self::NothingToClose { .. }
            | Self::UnbalancedLedger { .. }
            | Self::DraftsInRange { .. }
            | Self::UnclosedPriorActivity { .. }
            | Self::NewerPeriodClosed(_)
            | Self::SnapshotLocked(_)
            | Self::InvalidHierarchy(_)
            | Self::HasBalance { .. }
            | Self::HasActiveChildren(_)
            | Self::SystemCritical(_)
            | Self::InvalidState(_) => 422,

            // 500 Internal Server Error
            Self::Storage(_) => 500,
        }
    }

    /// Returns true if the caller may retry the same request unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Concurrency(_))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::NotFound { .. } => Self::NotFound(message),
            LedgerError::EmptyLines(_)
            | LedgerError::InvalidLine { .. }
            | LedgerError::InvalidDateRange { .. }
            | LedgerError::InvalidPeriod(_)
            | LedgerError::Validation(_) => Self::Validation(message),
            LedgerError::DuplicateCode(_)
            | LedgerError::AlreadyClosed { .. }
            | LedgerError::AlreadyLocked(_)
            | LedgerError::AlreadyReversed(_)
            | LedgerError::Concurrency(_) => Self::Conflict(message),
            LedgerError::IntegrityViolation { .. } => Self::Integrity(message),
            LedgerError::Storage(_) => Self::Database(message),
            _ => Self::BusinessRule(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_codes() {
        assert_eq!(LedgerError::EmptyLines(1).error_code(), "EMPTY_LINES");
        assert_eq!(
            LedgerError::Unbalanced {
                debit: dec!(100),
                credit: dec!(50),
            }
            .error_code(),
            "UNBALANCED"
        );
        assert_eq!(
            LedgerError::SnapshotLocked(SnapshotId::new()).error_code(),
            "SNAPSHOT_LOCKED"
        );
        assert_eq!(
            LedgerError::DuplicateCode("1101".into()).error_code(),
            "DUPLICATE_CODE"
        );
    }

    #[test]
    fn test_only_concurrency_is_retryable() {
        assert!(LedgerError::Concurrency("deadlock".into()).is_retryable());
        assert!(!LedgerError::Storage("io".into()).is_retryable());
        assert!(
            !LedgerError::PeriodLocked {
                start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_maps_into_app_error() {
        let app: AppError = LedgerError::not_found("account", "9999").into();
        assert_eq!(app.status_code(), 404);

        let app: AppError = LedgerError::Unbalanced {
            debit: dec!(10),
            credit: dec!(9),
        }
        .into();
        assert_eq!(app.error_code(), "BUSINESS_RULE_VIOLATION");

        let app: AppError = LedgerError::IntegrityViolation {
            snapshot_id: SnapshotId::new(),
            stored: "aa".into(),
            computed: "bb".into(),
        }
        .into();
        assert_eq!(app.error_code(), "INTEGRITY_VIOLATION");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            LedgerError::not_found("account", "9999").to_string(),
            "account not found: 9999"
        );
        assert_eq!(
            LedgerError::Unbalanced {
                debit: dec!(100.00),
                credit: dec!(90.00),
            }
            .to_string(),
            "Journal entry is not balanced. Debit: 100.00, Credit: 90.00"
        );
    }
}
