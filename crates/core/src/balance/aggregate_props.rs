//! Property tests for balance derivation.

use buku_shared::types::{AccountId, JournalEntryId, JournalLineId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::aggregate::{aggregate_lines, compute_balance, running_balances};
use crate::accounts::NormalBalance;
use crate::journal::JournalLine;

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=1_000_000_000i64, 0u32..=4).prop_map(|(units, scale)| Decimal::new(units, scale))
}

fn movement_strategy() -> impl Strategy<Value = (Decimal, Decimal)> {
    (amount_strategy(), any::<bool>()).prop_map(|(amount, is_debit)| {
        if is_debit {
            (amount, Decimal::ZERO)
        } else {
            (Decimal::ZERO, amount)
        }
    })
}

fn side_strategy() -> impl Strategy<Value = NormalBalance> {
    prop_oneof![Just(NormalBalance::Debit), Just(NormalBalance::Credit)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 3.1: The two normal sides always disagree by sign only.
    #[test]
    fn prop_sides_are_mirror_images(debit in amount_strategy(), credit in amount_strategy()) {
        let account = AccountId::new();
        let as_debit = compute_balance(account, NormalBalance::Debit, debit, credit);
        let as_credit = compute_balance(account, NormalBalance::Credit, debit, credit);
        prop_assert_eq!(as_debit.balance, -as_credit.balance);
    }

    /// Property 3.2: The last running balance equals opening plus the signed total.
    #[test]
    fn prop_running_balance_ends_at_total(
        opening in amount_strategy(),
        side in side_strategy(),
        movements in prop::collection::vec(movement_strategy(), 0..30),
    ) {
        let rows = running_balances(opening, side, movements.iter().copied());
        let debit: Decimal = movements.iter().map(|m| m.0).sum();
        let credit: Decimal = movements.iter().map(|m| m.1).sum();

        let last = rows.last().map_or(opening, |r| r.current);
        prop_assert_eq!(last, opening + side.signed(debit, credit));
        prop_assert_eq!(rows.len(), movements.len());
        for (i, row) in rows.iter().enumerate() {
            prop_assert_eq!(row.sequence, i32::try_from(i).unwrap() + 1);
        }
    }

    /// Property 3.3: Grouping by account preserves the grand totals.
    #[test]
    fn prop_aggregation_preserves_totals(
        movements in prop::collection::vec((0usize..4, movement_strategy()), 0..40),
    ) {
        let accounts: Vec<AccountId> = (0..4).map(|_| AccountId::new()).collect();
        let lines: Vec<JournalLine> = movements
            .iter()
            .map(|(idx, (debit, credit))| JournalLine {
                id: JournalLineId::new(),
                entry_id: JournalEntryId::new(),
                account_id: accounts[*idx],
                debit: *debit,
                credit: *credit,
                description: None,
                line_number: 1,
            })
            .collect();

        let totals = aggregate_lines(&lines);
        let grouped_debit: Decimal = totals.iter().map(|t| t.debit).sum();
        let grouped_credit: Decimal = totals.iter().map(|t| t.credit).sum();
        prop_assert_eq!(grouped_debit, lines.iter().map(|l| l.debit).sum::<Decimal>());
        prop_assert_eq!(grouped_credit, lines.iter().map(|l| l.credit).sum::<Decimal>());
        prop_assert!(totals.len() <= 4);
    }
}
