//! Row-level diff between two snapshots.
//!
//! Rows pair up in three passes:
//! 1. exact matches on (reference, debit, credit, date)
//! 2. leftovers sharing a reference, classified as DATE_CHANGE, AMOUNT_CHANGE or MODIFIED
//! 3. whatever remains is MISSING (base only) or ADDED (current only)

use rust_decimal::Decimal;

use super::types::{DifferenceKind, TransactionSnapshot};

/// A delta found between two row sets, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDifference {
    /// Kind of delta.
    pub kind: DifferenceKind,
    /// Transaction reference.
    pub reference: String,
    /// Changed field, when one applies.
    pub field: Option<&'static str>,
    /// Base value.
    pub old_value: Option<String>,
    /// Current value.
    pub new_value: Option<String>,
    /// Signed effect on the balance (current - base).
    pub amount_difference: Decimal,
}

fn same_amount(a: &TransactionSnapshot, b: &TransactionSnapshot) -> bool {
    a.debit == b.debit && a.credit == b.credit
}

fn exact(a: &TransactionSnapshot, b: &TransactionSnapshot) -> bool {
    a.reference == b.reference && same_amount(a, b) && a.entry_date == b.entry_date
}

fn classify(base: &TransactionSnapshot, current: &TransactionSnapshot) -> RowDifference {
    let amount_difference = current.amount() - base.amount();
    let date = |row: &TransactionSnapshot| row.entry_date.format("%Y-%m-%d").to_string();
    let amount = |row: &TransactionSnapshot| row.amount().normalize().to_string();

    let (kind, field, old_value, new_value) = if same_amount(base, current) {
        (DifferenceKind::DateChange, "entry_date", date(base), date(current))
    } else if base.entry_date == current.entry_date {
        (DifferenceKind::AmountChange, "amount", amount(base), amount(current))
    } else {
        (
            DifferenceKind::Modified,
            "amount,entry_date",
            format!("{} @ {}", amount(base), date(base)),
            format!("{} @ {}", amount(current), date(current)),
        )
    };

    RowDifference {
        kind,
        reference: base.reference.clone(),
        field: Some(field),
        old_value: Some(old_value),
        new_value: Some(new_value),
        amount_difference,
    }
}

/// Diffs two ordered row sets. Identical inputs yield no differences.
#[must_use]
pub fn diff_rows(base: &[TransactionSnapshot], current: &[TransactionSnapshot]) -> Vec<RowDifference> {
    let mut base_matched = vec![false; base.len()];
    let mut current_matched = vec![false; current.len()];

    for (i, b) in base.iter().enumerate() {
        if let Some(j) = (0..current.len()).find(|&j| !current_matched[j] && exact(b, &current[j])) {
            base_matched[i] = true;
            current_matched[j] = true;
        }
    }

    let mut differences = Vec::new();

    // Same reference, prefer the candidate that differs in the fewest fields.
    for (i, b) in base.iter().enumerate() {
        if base_matched[i] {
            continue;
        }
        let candidates: Vec<usize> = (0..current.len())
            .filter(|&j| !current_matched[j] && current[j].reference == b.reference)
            .collect();
        let pick = candidates
            .iter()
            .copied()
            .find(|&j| same_amount(b, &current[j]))
            .or_else(|| candidates.iter().copied().find(|&j| current[j].entry_date == b.entry_date))
            .or_else(|| candidates.first().copied());
        if let Some(j) = pick {
            base_matched[i] = true;
            current_matched[j] = true;
            differences.push(classify(b, &current[j]));
        }
    }

    for (b, _) in base.iter().zip(&base_matched).filter(|(_, matched)| !**matched) {
        differences.push(RowDifference {
            kind: DifferenceKind::Missing,
            reference: b.reference.clone(),
            field: None,
            old_value: Some(b.amount().normalize().to_string()),
            new_value: None,
            amount_difference: -b.amount(),
        });
    }

    for (c, _) in current.iter().zip(&current_matched).filter(|(_, matched)| !**matched) {
        differences.push(RowDifference {
            kind: DifferenceKind::Added,
            reference: c.reference.clone(),
            field: None,
            old_value: None,
            new_value: Some(c.amount().normalize().to_string()),
            amount_difference: c.amount(),
        });
    }

    differences
}

#[cfg(test)]
mod tests {
    use super::*;
    use buku_shared::types::{JournalEntryId, SnapshotId, TransactionSnapshotId};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn row(reference: &str, day: u32, debit: Decimal, credit: Decimal) -> TransactionSnapshot {
        TransactionSnapshot {
            id: TransactionSnapshotId::new(),
            snapshot_id: SnapshotId::new(),
            line_number: 1,
            entry_id: JournalEntryId::new(),
            entry_date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            reference: reference.to_string(),
            description: String::new(),
            debit,
            credit,
            running_balance: dec!(0),
        }
    }

    #[test]
    fn test_identical_sets_have_no_differences() {
        let rows = vec![row("JE-1", 2, dec!(100), dec!(0)), row("JE-2", 3, dec!(0), dec!(40))];
        assert!(diff_rows(&rows, &rows.clone()).is_empty());
    }

    #[test]
    fn test_classifies_each_kind() {
        let base = vec![
            row("JE-1", 2, dec!(100), dec!(0)),
            row("JE-2", 3, dec!(50), dec!(0)),
            row("JE-3", 4, dec!(0), dec!(20)),
            row("JE-4", 5, dec!(10), dec!(0)),
            row("JE-5", 6, dec!(5), dec!(0)),
        ];
        let current = vec![
            row("JE-1", 2, dec!(100), dec!(0)),
            row("JE-2", 9, dec!(50), dec!(0)),
            row("JE-3", 4, dec!(0), dec!(25)),
            row("JE-4", 7, dec!(12), dec!(0)),
            row("JE-6", 8, dec!(0), dec!(3)),
        ];

        let diffs = diff_rows(&base, &current);
        let kind_of = |reference: &str| {
            diffs
                .iter()
                .find(|d| d.reference == reference)
                .map(|d| d.kind)
                .unwrap()
        };

        assert_eq!(diffs.len(), 5);
        assert_eq!(kind_of("JE-2"), DifferenceKind::DateChange);
        assert_eq!(kind_of("JE-3"), DifferenceKind::AmountChange);
        assert_eq!(kind_of("JE-4"), DifferenceKind::Modified);
        assert_eq!(kind_of("JE-5"), DifferenceKind::Missing);
        assert_eq!(kind_of("JE-6"), DifferenceKind::Added);
    }

    #[test]
    fn test_amount_difference_sums_to_balance_change() {
        let base = vec![row("JE-1", 2, dec!(100), dec!(0)), row("JE-2", 3, dec!(0), dec!(30))];
        let current = vec![row("JE-1", 2, dec!(120), dec!(0)), row("JE-3", 4, dec!(7), dec!(0))];

        let base_total: Decimal = base.iter().map(TransactionSnapshot::amount).sum();
        let current_total: Decimal = current.iter().map(TransactionSnapshot::amount).sum();
        let diff_total: Decimal = diff_rows(&base, &current)
            .iter()
            .map(|d| d.amount_difference)
            .sum();

        assert_eq!(diff_total, current_total - base_total);
    }

    #[test]
    fn test_duplicate_references_pair_one_to_one() {
        let base = vec![row("JE-1", 2, dec!(10), dec!(0)), row("JE-1", 2, dec!(0), dec!(10))];
        let current = vec![row("JE-1", 2, dec!(0), dec!(10))];

        let diffs = diff_rows(&base, &current);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DifferenceKind::Missing);
        assert_eq!(diffs[0].amount_difference, dec!(-10));
    }
}
