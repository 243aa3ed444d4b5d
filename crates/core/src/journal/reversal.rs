//! Reversing entries.
//!
//! History is append-only: a posted entry is cancelled by posting its mirror,
//! never by editing it.

use rust_decimal::Decimal;

use super::draft::JournalDraft;
use super::types::{EntryMeta, EntryStatus, JournalEntry, JournalLine, LineInput};
use crate::error::{LedgerError, LedgerResult};

/// Code prefix of reversing entries.
pub const REVERSAL_PREFIX: &str = "REV-";

/// Stateless builder of reversing entries.
pub struct ReversalBuilder;

impl ReversalBuilder {
    /// Builds the mirror of a posted entry.
    ///
    /// For each original line:
    /// - Debits become credits
    /// - Credits become debits
    /// - Account is preserved
    /// - Description is prefixed with "Reversal: "
    ///
    /// The reversal is dated on the original's date so it lands in the same
    /// period and nets it to zero there.
    pub fn build(original: &JournalEntry, lines: &[JournalLine], reason: &str) -> LedgerResult<JournalDraft> {
        if original.status != EntryStatus::Posted {
            return Err(LedgerError::InvalidState(format!(
                "only POSTED entries can be reversed, {} is {}",
                original.code, original.status
            )));
        }

        let reversed = lines
            .iter()
            .map(|line| {
                let description = format!(
                    "Reversal: {}",
                    line.description.as_deref().unwrap_or(&original.description)
                );
                let mirrored = if line.debit > Decimal::ZERO {
                    LineInput::credit(line.account_id, line.debit)
                } else {
                    LineInput::debit(line.account_id, line.credit)
                };
                mirrored.described(description)
            })
            .collect();

        let mut meta = EntryMeta::new(
            format!("{REVERSAL_PREFIX}{}", original.code),
            original.entry_date,
            format!("Reversal: {} ({reason})", original.description),
        );
        meta.source.clone_from(&original.source);

        Ok(JournalDraft::new(meta, reversed)?.reversing(original.id))
    }
}
