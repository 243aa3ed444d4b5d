//! Balance derivation rules.
//!
//! Every balance in the system, cached or not, is produced by these functions
//! from posted lines:
//! - debit-normal (Asset/Expense): balance = debit - credit
//! - credit-normal (Liability/Equity/Revenue): balance = credit - debit

use std::collections::BTreeMap;

use buku_shared::types::AccountId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::accounts::NormalBalance;
use crate::journal::JournalLine;

/// Derived totals of one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// The account.
    pub account_id: AccountId,
    /// Sum of posted debits.
    pub debit: Decimal,
    /// Sum of posted credits.
    pub credit: Decimal,
    /// Signed by the account's normal side.
    pub balance: Decimal,
}

impl AccountBalance {
    /// A balance with no postings.
    #[must_use]
    pub const fn zero(account_id: AccountId) -> Self {
        Self {
            account_id,
            debit: Decimal::ZERO,
            credit: Decimal::ZERO,
            balance: Decimal::ZERO,
        }
    }
}

/// Raw debit and credit sums of one account, before signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTotals {
    /// The account.
    pub account_id: AccountId,
    /// Sum of debits.
    pub debit: Decimal,
    /// Sum of credits.
    pub credit: Decimal,
}

/// Applies the normal-balance sign to raw totals.
#[must_use]
pub fn compute_balance(
    account_id: AccountId,
    normal: NormalBalance,
    debit: Decimal,
    credit: Decimal,
) -> AccountBalance {
    AccountBalance {
        account_id,
        debit,
        credit,
        balance: normal.signed(debit, credit),
    }
}

/// Groups lines by account and sums each side.
pub fn aggregate_lines<'a, I>(lines: I) -> Vec<AccountTotals>
where
    I: IntoIterator<Item = &'a JournalLine>,
{
    let mut sums: BTreeMap<AccountId, (Decimal, Decimal)> = BTreeMap::new();
    for line in lines {
        let entry = sums.entry(line.account_id).or_default();
        entry.0 += line.debit;
        entry.1 += line.credit;
    }
    sums.into_iter()
        .map(|(account_id, (debit, credit))| AccountTotals {
            account_id,
            debit,
            credit,
        })
        .collect()
}

/// Running balance after one movement.
///
/// - current = previous + change
/// - previous of row N = current of row N-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningBalance {
    /// 1-based position.
    pub sequence: i32,
    /// Balance before the movement.
    pub previous: Decimal,
    /// Balance after the movement.
    pub current: Decimal,
}

impl RunningBalance {
    /// The first movement after an opening balance.
    #[must_use]
    pub fn first(opening: Decimal, change: Decimal) -> Self {
        Self {
            sequence: 1,
            previous: opening,
            current: opening + change,
        }
    }

    /// The movement following `previous`.
    #[must_use]
    pub fn next(previous: &Self, change: Decimal) -> Self {
        Self {
            sequence: previous.sequence + 1,
            previous: previous.current,
            current: previous.current + change,
        }
    }
}

/// Running balances for a sequence of (debit, credit) movements.
pub fn running_balances<I>(opening: Decimal, normal: NormalBalance, movements: I) -> Vec<RunningBalance>
where
    I: IntoIterator<Item = (Decimal, Decimal)>,
{
    let mut out: Vec<RunningBalance> = Vec::new();
    for (debit, credit) in movements {
        let change = normal.signed(debit, credit);
        let next = match out.last() {
            Some(prev) => RunningBalance::next(prev, change),
            None => RunningBalance::first(opening, change),
        };
        out.push(next);
    }
    out
}
