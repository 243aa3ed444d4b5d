//! Reconciliation snapshot and difference types.

use buku_shared::types::{
    AccountId, DifferenceId, JournalEntryId, ReconciliationId, SnapshotId, TransactionSnapshotId,
};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// A calendar month label, `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthPeriod {
    first_day: NaiveDate,
}

impl MonthPeriod {
    /// Builds the period for a year and month.
    pub fn new(year: i32, month: u32) -> Result<Self, LedgerError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first_day| Self { first_day })
            .ok_or_else(|| LedgerError::InvalidPeriod(format!("{year:04}-{month:02}")))
    }

    /// The month containing `date`.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first_day: date.with_day(1).unwrap_or(date),
        }
    }

    /// First day of the month.
    #[must_use]
    pub const fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    /// Last day of the month.
    #[must_use]
    pub fn last_day(&self) -> NaiveDate {
        self.first_day
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(self.first_day)
    }

    /// The `YYYY-MM` label.
    #[must_use]
    pub fn label(&self) -> String {
        self.first_day.format("%Y-%m").to_string()
    }
}

impl std::fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

impl std::str::FromStr for MonthPeriod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::InvalidPeriod(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

/// Lifecycle of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotStatus {
    /// The current snapshot for its account and period.
    Active,
    /// Replaced by a newer capture.
    Superseded,
    /// Retired by hand.
    Archived,
}

/// A hash-sealed, point-in-time copy of a cash/bank account's activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSnapshot {
    /// Unique identifier.
    pub id: SnapshotId,
    /// The cash/bank account.
    pub account_id: AccountId,
    /// Period label, `YYYY-MM`.
    pub period: String,
    /// Last day covered.
    pub snapshot_date: NaiveDate,
    /// When the rows were frozen.
    pub captured_at: DateTime<Utc>,
    /// Balance before the first day of the period.
    pub opening_balance: Decimal,
    /// Balance after the last row.
    pub closing_balance: Decimal,
    /// Sum of row debits.
    pub total_debit: Decimal,
    /// Sum of row credits.
    pub total_credit: Decimal,
    /// Number of frozen rows.
    pub transaction_count: i64,
    /// Lowercase hex SHA-256 over the canonical header and rows.
    pub data_hash: String,
    /// Once set, the rows can never be rewritten.
    pub locked: bool,
    /// When the lock was applied.
    pub locked_at: Option<DateTime<Utc>>,
    /// Who applied the lock.
    pub locked_by: Option<String>,
    /// Lifecycle status.
    pub status: SnapshotStatus,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// A frozen copy of one posted line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSnapshot {
    /// Unique identifier.
    pub id: TransactionSnapshotId,
    /// Owning snapshot.
    pub snapshot_id: SnapshotId,
    /// 1-based position in canonical order.
    pub line_number: i32,
    /// Source entry.
    pub entry_id: JournalEntryId,
    /// Entry date.
    pub entry_date: NaiveDate,
    /// Entry code.
    pub reference: String,
    /// Line or entry narrative.
    pub description: String,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Balance after this row.
    pub running_balance: Decimal,
}

impl TransactionSnapshot {
    /// Signed movement, debit positive.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.debit - self.credit
    }
}

/// Review status of a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationStatus {
    /// Awaiting review.
    Pending,
    /// Accepted by a reviewer.
    Approved,
    /// Refused by a reviewer.
    Rejected,
    /// Integrity problem, a human must look.
    NeedsReview,
}

impl ReconciliationStatus {
    /// Returns true if a reviewer may still approve or reject.
    #[must_use]
    pub const fn is_reviewable(self) -> bool {
        matches!(self, Self::Pending | Self::NeedsReview)
    }
}

/// The persisted result of comparing two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Unique identifier.
    pub id: ReconciliationId,
    /// The cash/bank account.
    pub account_id: AccountId,
    /// Earlier snapshot.
    pub base_snapshot_id: SnapshotId,
    /// Later snapshot.
    pub comparison_snapshot_id: SnapshotId,
    /// Closing balance of the base snapshot.
    pub base_balance: Decimal,
    /// Closing balance of the comparison snapshot.
    pub current_balance: Decimal,
    /// current - base.
    pub variance: Decimal,
    /// Rows in the base snapshot.
    pub base_count: i64,
    /// Rows in the comparison snapshot.
    pub current_count: i64,
    /// MISSING differences.
    pub missing_count: i64,
    /// ADDED differences.
    pub added_count: i64,
    /// MODIFIED, AMOUNT_CHANGE and DATE_CHANGE differences.
    pub modified_count: i64,
    /// Review status.
    pub status: ReconciliationStatus,
    /// Zero variance and no differences.
    pub is_balanced: bool,
    /// Reviewer notes.
    pub review_notes: Option<String>,
    /// Reviewer.
    pub reviewed_by: Option<String>,
    /// Review timestamp.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Who ran the comparison.
    pub created_by: String,
    /// When the comparison ran.
    pub created_at: DateTime<Utc>,
}

/// Kind of delta between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DifferenceKind {
    /// In base, gone from current.
    Missing,
    /// New in current.
    Added,
    /// Same reference, amount and date both changed.
    Modified,
    /// Same reference and date, amount changed.
    AmountChange,
    /// Same reference and amount, date changed.
    DateChange,
    /// A stored hash no longer matches its rows.
    IntegrityViolation,
}

impl DifferenceKind {
    /// How urgently a reviewer should look.
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::Missing | Self::DateChange => Severity::High,
            Self::Added | Self::Modified => Severity::Medium,
            Self::AmountChange | Self::IntegrityViolation => Severity::Critical,
        }
    }
}

/// Urgency of a difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Informational.
    Low,
    /// Needs attention.
    Medium,
    /// Needs attention soon.
    High,
    /// Needs attention now.
    Critical,
}

/// Review outcome of a single difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionStatus {
    /// Not yet looked at.
    Pending,
    /// Explained and settled.
    Resolved,
    /// Accepted as is.
    Ignored,
    /// Handed upward.
    Escalated,
}

/// One delta between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationDifference {
    /// Unique identifier.
    pub id: DifferenceId,
    /// Owning reconciliation.
    pub reconciliation_id: ReconciliationId,
    /// Kind of delta.
    pub kind: DifferenceKind,
    /// Derived from the kind.
    pub severity: Severity,
    /// Transaction reference the delta concerns.
    pub reference: Option<String>,
    /// Changed field.
    pub field: Option<String>,
    /// Value in the base snapshot.
    pub old_value: Option<String>,
    /// Value in the comparison snapshot.
    pub new_value: Option<String>,
    /// Signed effect on the balance.
    pub amount_difference: Decimal,
    /// Review outcome.
    pub resolution: ResolutionStatus,
    /// Reviewer notes.
    pub resolution_notes: Option<String>,
    /// When the outcome was recorded.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// A reconciliation with its differences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Header.
    pub reconciliation: Reconciliation,
    /// Deltas, base order first.
    pub differences: Vec<ReconciliationDifference>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month_period() {
        let period: MonthPeriod = "2026-02".parse().unwrap();
        assert_eq!(period.first_day(), NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert_eq!(period.last_day(), NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
        assert_eq!(period.label(), "2026-02");

        let december: MonthPeriod = "2025-12".parse().unwrap();
        assert_eq!(december.last_day(), NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn test_reject_bad_labels() {
        for label in ["2026-13", "2026-1", "26-01", "2026/01", "", "abcd-ef"] {
            assert!(
                matches!(label.parse::<MonthPeriod>(), Err(LedgerError::InvalidPeriod(_))),
                "{label} should be rejected"
            );
        }
    }

    #[test]
    fn test_severity_by_kind() {
        assert_eq!(DifferenceKind::Missing.severity(), Severity::High);
        assert_eq!(DifferenceKind::Added.severity(), Severity::Medium);
        assert_eq!(DifferenceKind::AmountChange.severity(), Severity::Critical);
        assert_eq!(DifferenceKind::DateChange.severity(), Severity::High);
        assert_eq!(DifferenceKind::IntegrityViolation.severity(), Severity::Critical);
    }
}
