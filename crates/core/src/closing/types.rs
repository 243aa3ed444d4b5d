//! Accounting period types.

use buku_shared::types::{AccountId, JournalEntryId, PeriodId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::accounts::AccountType;

/// State of a period in the closing workflow.
///
/// `Open` and `PreviewGenerated` are never stored: a date with no stored
/// period is open, and a preview writes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodStatus {
    /// Accepting postings.
    Open,
    /// A closing preview was computed.
    PreviewGenerated,
    /// Closing entry posted, postings refused.
    Closed,
    /// Closing entry reversed. The period no longer covers its range.
    Reopened,
}

impl PeriodStatus {
    /// Returns true if the workflow allows moving to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Open | Self::Reopened, Self::PreviewGenerated)
                | (Self::PreviewGenerated, Self::PreviewGenerated | Self::Closed)
                | (Self::Closed, Self::Reopened)
        )
    }

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::PreviewGenerated => "PREVIEW_GENERATED",
            Self::Closed => "CLOSED",
            Self::Reopened => "REOPENED",
        }
    }
}

impl std::fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A closed (or once-closed) date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingPeriod {
    /// Unique identifier.
    pub id: PeriodId,
    /// First day, inclusive.
    pub start_date: NaiveDate,
    /// Last day, inclusive.
    pub end_date: NaiveDate,
    /// Workflow status.
    pub status: PeriodStatus,
    /// Hard lock. A locked period can never be reopened.
    pub locked: bool,
    /// When the lock was applied.
    pub locked_at: Option<DateTime<Utc>>,
    /// Who applied the lock.
    pub locked_by: Option<String>,
    /// Revenue closed out.
    pub total_revenue: Decimal,
    /// Expense closed out.
    pub total_expense: Decimal,
    /// Revenue minus expense.
    pub net_income: Decimal,
    /// Posted entries in range at close time.
    pub total_entries: i64,
    /// The closing entry, absent when nothing needed zeroing.
    pub closing_entry_id: Option<JournalEntryId>,
    /// Where net income went.
    pub retained_earnings_id: AccountId,
    /// Close timestamp.
    pub closed_at: DateTime<Utc>,
    /// Reopen timestamp.
    pub reopened_at: Option<DateTime<Utc>>,
    /// Why it was reopened.
    pub reopen_reason: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
}

impl AccountingPeriod {
    /// Returns true if `date` lies within the range.
    #[must_use]
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Returns true if the ranges share at least one day.
    #[must_use]
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }

    /// A reopened period no longer governs its range.
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        self.status == PeriodStatus::Reopened
    }

    /// Returns true if postings dated inside the range must be refused.
    #[must_use]
    pub fn blocks_posting(&self) -> bool {
        self.locked || self.status == PeriodStatus::Closed
    }
}

/// Balance of one temporary account within the closing range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingAccountBalance {
    /// The account.
    pub account_id: AccountId,
    /// Its code.
    pub code: String,
    /// Its name.
    pub name: String,
    /// REVENUE or EXPENSE.
    pub account_type: AccountType,
    /// In-range balance using the account's normal side.
    pub balance: Decimal,
}

/// Account a proposed closing line targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "account_id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClosingTarget {
    /// A specific temporary account.
    Account(AccountId),
    /// Whichever retained earnings account the close names.
    RetainedEarnings,
}

/// A proposed line of the closing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingLine {
    /// Target account.
    pub target: ClosingTarget,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Line narrative.
    pub description: String,
}

/// Result of a closing preview. Nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingPreview {
    /// First day of the range.
    pub start_date: NaiveDate,
    /// Last day of the range.
    pub end_date: NaiveDate,
    /// Always `PreviewGenerated`.
    pub status: PeriodStatus,
    /// Revenue accounts with a non-zero in-range balance.
    pub revenue_accounts: Vec<ClosingAccountBalance>,
    /// Expense accounts with a non-zero in-range balance.
    pub expense_accounts: Vec<ClosingAccountBalance>,
    /// Sum of revenue balances.
    pub total_revenue: Decimal,
    /// Sum of expense balances.
    pub total_expense: Decimal,
    /// Revenue minus expense.
    pub net_income: Decimal,
    /// Debits of all posted lines in range.
    pub total_debit: Decimal,
    /// Credits of all posted lines in range.
    pub total_credit: Decimal,
    /// Posted entries in range.
    pub entry_count: u64,
    /// Lines the closing entry would carry.
    pub proposed_lines: Vec<ClosingLine>,
    /// DRAFT entries dated in range.
    pub draft_count: u64,
    /// Revenue and expense balances posted before the range and never closed.
    pub unclosed_prior: Vec<ClosingAccountBalance>,
    /// False when `close` would refuse the range.
    pub can_close: bool,
    /// Why the range cannot be closed, plus advisory warnings.
    pub validation_messages: Vec<String>,
}

/// Summary of the most recent close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastClosingInfo {
    /// The latest closed period, if any.
    pub last_period: Option<AccountingPeriod>,
    /// Suggested start of the next close: the day after the last closed end,
    /// or the earliest posted entry date when nothing was ever closed.
    pub next_start_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PeriodStatus::Open, PeriodStatus::PreviewGenerated, true)]
    #[case(PeriodStatus::PreviewGenerated, PeriodStatus::Closed, true)]
    #[case(PeriodStatus::Closed, PeriodStatus::Reopened, true)]
    #[case(PeriodStatus::Reopened, PeriodStatus::PreviewGenerated, true)]
    #[case(PeriodStatus::Open, PeriodStatus::Closed, false)]
    #[case(PeriodStatus::Closed, PeriodStatus::Open, false)]
    #[case(PeriodStatus::Reopened, PeriodStatus::Closed, false)]
    #[case(PeriodStatus::Closed, PeriodStatus::Closed, false)]
    fn test_transitions(#[case] from: PeriodStatus, #[case] to: PeriodStatus, #[case] allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    fn period(start: (i32, u32, u32), end: (i32, u32, u32)) -> AccountingPeriod {
        AccountingPeriod {
            id: PeriodId::new(),
            start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
            status: PeriodStatus::Closed,
            locked: false,
            locked_at: None,
            locked_by: None,
            total_revenue: Decimal::ZERO,
            total_expense: Decimal::ZERO,
            net_income: Decimal::ZERO,
            total_entries: 0,
            closing_entry_id: None,
            retained_earnings_id: AccountId::new(),
            closed_at: Utc::now(),
            reopened_at: None,
            reopen_reason: None,
            notes: None,
        }
    }

    #[test]
    fn test_range_checks_are_inclusive() {
        let jan = period((2026, 1, 1), (2026, 1, 31));
        assert!(jan.covers(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
        assert!(jan.covers(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()));
        assert!(!jan.covers(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()));

        assert!(jan.overlaps(
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
        ));
        assert!(!jan.overlaps(
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
        ));
    }

    #[test]
    fn test_reopened_period_stops_blocking() {
        let mut jan = period((2026, 1, 1), (2026, 1, 31));
        assert!(jan.blocks_posting());
        jan.status = PeriodStatus::Reopened;
        assert!(jan.is_superseded());
        assert!(!jan.blocks_posting());
    }
}
