//! Snapshot sealing.
//!
//! The seal is a SHA-256 over a canonical text rendering of the snapshot
//! header and its ordered rows. Decimals are normalized so that `100.0000`
//! read back from storage hashes the same as `100` at capture time.

use std::fmt::Write as _;

use buku_shared::types::AccountId;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use super::types::{ReconciliationSnapshot, TransactionSnapshot};

/// Header fields covered by the seal.
#[derive(Debug, Clone, Copy)]
pub struct SealHeader<'a> {
    /// The cash/bank account.
    pub account_id: AccountId,
    /// Period label.
    pub period: &'a str,
    /// Opening balance.
    pub opening_balance: Decimal,
    /// Closing balance.
    pub closing_balance: Decimal,
    /// Row count.
    pub transaction_count: i64,
}

impl<'a> From<&'a ReconciliationSnapshot> for SealHeader<'a> {
    fn from(snapshot: &'a ReconciliationSnapshot) -> Self {
        Self {
            account_id: snapshot.account_id,
            period: &snapshot.period,
            opening_balance: snapshot.opening_balance,
            closing_balance: snapshot.closing_balance,
            transaction_count: snapshot.transaction_count,
        }
    }
}

fn canonical_decimal(value: Decimal) -> String {
    if value.is_zero() {
        "0".to_string()
    } else {
        value.normalize().to_string()
    }
}

/// Renders the text that gets hashed: one header line, then one line per row.
#[must_use]
pub fn canonical_text(header: SealHeader<'_>, rows: &[TransactionSnapshot]) -> String {
    let mut text = format!(
        "{}|{}|{}|{}|{}\n",
        header.account_id,
        header.period,
        canonical_decimal(header.opening_balance),
        canonical_decimal(header.closing_balance),
        header.transaction_count,
    );
    for row in rows {
        let _ = writeln!(
            text,
            "{}|{}|{}|{}|{}",
            row.entry_date.format("%Y-%m-%d"),
            row.reference,
            canonical_decimal(row.debit),
            canonical_decimal(row.credit),
            canonical_decimal(row.running_balance),
        );
    }
    text
}

/// Computes the seal as lowercase hex.
#[must_use]
pub fn seal(header: SealHeader<'_>, rows: &[TransactionSnapshot]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_text(header, rows).as_bytes());
    hex::encode(hasher.finalize())
}

/// Recomputes the seal of a stored snapshot and compares it with the stored one.
///
/// Returns the recomputed hash on mismatch.
pub fn verify(snapshot: &ReconciliationSnapshot, rows: &[TransactionSnapshot]) -> Result<(), String> {
    let computed = seal(SealHeader::from(snapshot), rows);
    if computed == snapshot.data_hash {
        Ok(())
    } else {
        Err(computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buku_shared::types::{JournalEntryId, SnapshotId, TransactionSnapshotId};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn row(reference: &str, debit: Decimal, credit: Decimal, running: Decimal) -> TransactionSnapshot {
        TransactionSnapshot {
            id: TransactionSnapshotId::new(),
            snapshot_id: SnapshotId::new(),
            line_number: 1,
            entry_id: JournalEntryId::new(),
            entry_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            reference: reference.to_string(),
            description: "ignored by the seal".to_string(),
            debit,
            credit,
            running_balance: running,
        }
    }

    fn header(account_id: AccountId) -> SealHeader<'static> {
        SealHeader {
            account_id,
            period: "2026-01",
            opening_balance: dec!(0),
            closing_balance: dec!(100),
            transaction_count: 1,
        }
    }

    #[test]
    fn test_seal_is_hex_sha256() {
        let hash = seal(header(AccountId::new()), &[row("JE-1", dec!(100), dec!(0), dec!(100))]);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_scale_does_not_change_seal() {
        let account = AccountId::new();
        let a = seal(header(account), &[row("JE-1", dec!(100), dec!(0), dec!(100))]);
        let b = seal(
            header(account),
            &[row("JE-1", dec!(100.0000), dec!(0.0000), dec!(100.00))],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_any_covered_field_changes_seal() {
        let account = AccountId::new();
        let original = seal(header(account), &[row("JE-1", dec!(100), dec!(0), dec!(100))]);

        let amount = seal(header(account), &[row("JE-1", dec!(101), dec!(0), dec!(100))]);
        let reference = seal(header(account), &[row("JE-2", dec!(100), dec!(0), dec!(100))]);
        let running = seal(header(account), &[row("JE-1", dec!(100), dec!(0), dec!(99))]);
        let mut other_header = header(account);
        other_header.opening_balance = dec!(1);
        let opening = seal(other_header, &[row("JE-1", dec!(100), dec!(0), dec!(100))]);

        for changed in [amount, reference, running, opening] {
            assert_ne!(changed, original);
        }
    }

    #[test]
    fn test_canonical_text_layout() {
        let account = AccountId::new();
        let text = canonical_text(header(account), &[row("JE-1", dec!(100.50), dec!(0), dec!(100.50))]);
        assert_eq!(
            text,
            format!("{account}|2026-01|0|100|1\n2026-01-05|JE-1|100.5|0|100.5\n")
        );
    }
}
