//! Closing entry construction.
//!
//! Pure functions over in-range balances. The service reads the balances
//! inside its transaction and posts whatever these functions propose.

use std::collections::HashMap;

use buku_shared::types::AccountId;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::types::{ClosingAccountBalance, ClosingLine, ClosingTarget};
use crate::accounts::{Account, AccountType};
use crate::balance::AccountTotals;

/// Source document type of closing entries.
pub const CLOSING_DOC_TYPE: &str = "PERIOD-CLOSING";

/// Code of the closing entry, e.g. `CLO-2026-01-03-31`.
#[must_use]
pub fn closing_code(start: NaiveDate, end: NaiveDate) -> String {
    format!("CLO-{}-{}", start.format("%Y-%m"), end.format("%m-%d"))
}

/// Source document id of the closing entry, e.g. `PERIOD-CLOSING-20260101-20260331`.
#[must_use]
pub fn closing_reference(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "{CLOSING_DOC_TYPE}-{}-{}",
        start.format("%Y%m%d"),
        end.format("%Y%m%d")
    )
}

/// Splits in-range totals into non-zero revenue and expense balances, by code.
#[must_use]
pub fn temporary_balances(
    accounts: &HashMap<AccountId, Account>,
    totals: &[AccountTotals],
) -> (Vec<ClosingAccountBalance>, Vec<ClosingAccountBalance>) {
    let mut revenue = Vec::new();
    let mut expense = Vec::new();
    for t in totals {
        let Some(account) = accounts.get(&t.account_id) else {
            continue;
        };
        if !account.account_type.is_temporary() {
            continue;
        }
        let balance = account.normal_balance().signed(t.debit, t.credit);
        if balance.is_zero() {
            continue;
        }
        let row = ClosingAccountBalance {
            account_id: account.id,
            code: account.code.clone(),
            name: account.name.clone(),
            account_type: account.account_type,
            balance,
        };
        if account.account_type == AccountType::Revenue {
            revenue.push(row);
        } else {
            expense.push(row);
        }
    }
    revenue.sort_by(|a, b| a.code.cmp(&b.code));
    expense.sort_by(|a, b| a.code.cmp(&b.code));
    (revenue, expense)
}

fn zeroing_line(account: &ClosingAccountBalance) -> ClosingLine {
    // Posting the balance on the opposite side of the account's normal side.
    let amount = account.balance.abs();
    let debit_side = match account.account_type {
        AccountType::Revenue => account.balance > Decimal::ZERO,
        _ => account.balance < Decimal::ZERO,
    };
    let (debit, credit) = if debit_side {
        (amount, Decimal::ZERO)
    } else {
        (Decimal::ZERO, amount)
    };
    ClosingLine {
        target: ClosingTarget::Account(account.account_id),
        debit,
        credit,
        description: format!("Close {} {}", account.code, account.name),
    }
}

/// Lines that zero every temporary balance and move net income to retained
/// earnings. Empty when there is nothing to zero.
#[must_use]
pub fn closing_lines(revenue: &[ClosingAccountBalance], expense: &[ClosingAccountBalance]) -> Vec<ClosingLine> {
    let mut lines: Vec<ClosingLine> = revenue.iter().chain(expense).map(zeroing_line).collect();

    let net_income = net_income(revenue, expense);
    if net_income > Decimal::ZERO {
        lines.push(ClosingLine {
            target: ClosingTarget::RetainedEarnings,
            debit: Decimal::ZERO,
            credit: net_income,
            description: "Net income to retained earnings".to_string(),
        });
    } else if net_income < Decimal::ZERO {
        lines.push(ClosingLine {
            target: ClosingTarget::RetainedEarnings,
            debit: net_income.abs(),
            credit: Decimal::ZERO,
            description: "Net loss to retained earnings".to_string(),
        });
    }
    lines
}

/// Revenue minus expense.
#[must_use]
pub fn net_income(revenue: &[ClosingAccountBalance], expense: &[ClosingAccountBalance]) -> Decimal {
    total(revenue) - total(expense)
}

/// Sum of balances.
#[must_use]
pub fn total(balances: &[ClosingAccountBalance]) -> Decimal {
    balances.iter().map(|b| b.balance).sum()
}
