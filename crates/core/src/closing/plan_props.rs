//! Property tests for closing entry construction.

use buku_shared::types::AccountId;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::plan::{closing_lines, net_income};
use super::types::{ClosingAccountBalance, ClosingTarget};
use crate::accounts::AccountType;

fn balance_strategy(account_type: AccountType) -> impl Strategy<Value = ClosingAccountBalance> {
    (-1_000_000_000i64..=1_000_000_000i64, 0u32..=4)
        .prop_filter("non-zero", |(units, _)| *units != 0)
        .prop_map(move |(units, scale)| ClosingAccountBalance {
            account_id: AccountId::new(),
            code: String::new(),
            name: String::new(),
            account_type,
            balance: Decimal::new(units, scale),
        })
}

fn sides(lines: &[super::types::ClosingLine]) -> (Decimal, Decimal) {
    lines
        .iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(d, c), l| (d + l.debit, c + l.credit))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 4.1: The closing entry always balances exactly.
    #[test]
    fn prop_closing_lines_balance(
        revenue in prop::collection::vec(balance_strategy(AccountType::Revenue), 0..6),
        expense in prop::collection::vec(balance_strategy(AccountType::Expense), 0..6),
    ) {
        let lines = closing_lines(&revenue, &expense);
        let (debit, credit) = sides(&lines);
        prop_assert_eq!(debit, credit);
    }

    /// Property 4.2: Each line is one-sided and positive.
    #[test]
    fn prop_closing_lines_are_one_sided(
        revenue in prop::collection::vec(balance_strategy(AccountType::Revenue), 0..6),
        expense in prop::collection::vec(balance_strategy(AccountType::Expense), 0..6),
    ) {
        for line in closing_lines(&revenue, &expense) {
            prop_assert!(line.debit >= Decimal::ZERO && line.credit >= Decimal::ZERO);
            prop_assert!(line.debit.is_zero() != line.credit.is_zero());
        }
    }

    /// Property 4.3: Applying the lines zeroes every temporary account and moves
    /// exactly the net income into retained earnings.
    #[test]
    fn prop_closing_zeroes_and_transfers_net_income(
        revenue in prop::collection::vec(balance_strategy(AccountType::Revenue), 0..6),
        expense in prop::collection::vec(balance_strategy(AccountType::Expense), 0..6),
    ) {
        let lines = closing_lines(&revenue, &expense);

        for account in revenue.iter().chain(&expense) {
            let line = lines
                .iter()
                .find(|l| l.target == ClosingTarget::Account(account.account_id))
                .expect("every non-zero account gets a line");
            let after = account.balance + account.account_type.normal_balance().signed(line.debit, line.credit);
            prop_assert_eq!(after, Decimal::ZERO);
        }

        let retained: Decimal = lines
            .iter()
            .filter(|l| l.target == ClosingTarget::RetainedEarnings)
            .map(|l| l.credit - l.debit)
            .sum();
        prop_assert_eq!(retained, net_income(&revenue, &expense));
    }
}
