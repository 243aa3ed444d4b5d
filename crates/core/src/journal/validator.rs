//! Posting rules.
//!
//! Checks run in a fixed order: balance, accounts, period. Account and period
//! data are handed in by the caller, which reads them inside the posting
//! transaction.

use buku_shared::types::AccountId;
use chrono::NaiveDate;

use super::types::{EntryTotals, JournalLine};
use crate::accounts::Account;
use crate::closing::AccountingPeriod;
use crate::error::{LedgerError, LedgerResult};

/// Stateless posting validator.
pub struct PostingValidator;

impl PostingValidator {
    /// Recomputes the sums and requires debit == credit exactly.
    pub fn check_balanced(lines: &[JournalLine]) -> LedgerResult<EntryTotals> {
        let totals = EntryTotals::from_amounts(lines.iter().map(|l| (l.debit, l.credit)));
        if totals.is_balanced() {
            Ok(totals)
        } else {
            Err(LedgerError::Unbalanced {
                debit: totals.debit,
                credit: totals.credit,
            })
        }
    }

    /// Requires every referenced account to exist, be active, and not be a header.
    pub fn check_accounts<F>(lines: &[JournalLine], account_lookup: F) -> LedgerResult<()>
    where
        F: Fn(AccountId) -> Option<Account>,
    {
        for line in lines {
            account_lookup(line.account_id)
                .ok_or_else(|| LedgerError::invalid_account(line.account_id, "account not found"))?
                .ensure_postable()?;
        }
        Ok(())
    }

    /// Refuses dates inside a closed or locked period.
    pub fn check_period(date: NaiveDate, periods: &[AccountingPeriod]) -> LedgerResult<()> {
        match periods.iter().find(|p| p.covers(date) && p.blocks_posting()) {
            Some(period) => Err(LedgerError::PeriodLocked {
                start: period.start_date,
                end: period.end_date,
            }),
            None => Ok(()),
        }
    }

    /// Runs all checks in order and returns the recomputed totals.
    pub fn validate<F>(
        date: NaiveDate,
        lines: &[JournalLine],
        account_lookup: F,
        periods: &[AccountingPeriod],
    ) -> LedgerResult<EntryTotals>
    where
        F: Fn(AccountId) -> Option<Account>,
    {
        let totals = Self::check_balanced(lines)?;
        Self::check_accounts(lines, account_lookup)?;
        Self::check_period(date, periods)?;
        Ok(totals)
    }
}
