//! Property tests for the posting validator.

use buku_shared::types::{AccountId, JournalEntryId, JournalLineId, PeriodId};
use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::types::JournalLine;
use super::validator::PostingValidator;
use crate::closing::{AccountingPeriod, PeriodStatus};
use crate::error::LedgerError;

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000_000_000i64, 0u32..=4).prop_map(|(units, scale)| Decimal::new(units, scale))
}

fn line(debit: Decimal, credit: Decimal) -> JournalLine {
    JournalLine {
        id: JournalLineId::new(),
        entry_id: JournalEntryId::new(),
        account_id: AccountId::new(),
        debit,
        credit,
        description: None,
        line_number: 1,
    }
}

/// Debit lines plus one balancing credit line.
fn balanced_lines(debits: &[Decimal]) -> Vec<JournalLine> {
    let total: Decimal = debits.iter().copied().sum();
    let mut lines: Vec<JournalLine> = debits.iter().map(|d| line(*d, Decimal::ZERO)).collect();
    lines.push(line(Decimal::ZERO, total));
    lines
}

fn closed(start: NaiveDate, end: NaiveDate, locked: bool, status: PeriodStatus) -> AccountingPeriod {
    AccountingPeriod {
        id: PeriodId::new(),
        start_date: start,
        end_date: end,
        status,
        locked,
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

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 2.1: Balanced line sets pass and report equal totals.
    #[test]
    fn prop_balanced_lines_pass(debits in prop::collection::vec(amount_strategy(), 1..10)) {
        let lines = balanced_lines(&debits);
        let totals = PostingValidator::check_balanced(&lines).unwrap();
        prop_assert_eq!(totals.debit, totals.credit);
        prop_assert_eq!(totals.debit, debits.iter().copied().sum::<Decimal>());
    }

    /// Property 2.2: Any non-zero skew is rejected with the exact sums.
    #[test]
    fn prop_skewed_lines_fail(
        debits in prop::collection::vec(amount_strategy(), 1..10),
        skew in amount_strategy(),
    ) {
        let mut lines = balanced_lines(&debits);
        lines.push(line(skew, Decimal::ZERO));
        let total: Decimal = debits.iter().copied().sum();

        let err = PostingValidator::check_balanced(&lines).unwrap_err();
        prop_assert_eq!(err, LedgerError::Unbalanced { debit: total + skew, credit: total });
    }

    /// Property 2.3: A date is refused exactly when a blocking period covers it.
    #[test]
    fn prop_period_check_matches_coverage(
        offset in 0i64..120,
        locked in any::<bool>(),
        reopened in any::<bool>(),
    ) {
        let start = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        let status = if reopened { PeriodStatus::Reopened } else { PeriodStatus::Closed };
        let period = closed(start, end, locked, status);
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + chrono::Days::new(offset.unsigned_abs());

        let refused = PostingValidator::check_period(date, std::slice::from_ref(&period)).is_err();
        let covered = date >= start && date <= end;
        prop_assert_eq!(refused, covered && (locked || !reopened));
    }
}
