//! In-memory journal aggregate, built and validated before anything is stored.

use buku_shared::types::{JournalEntryId, JournalLineId, PeriodId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::types::{EntryMeta, EntryStatus, EntryTotals, JournalEntry, JournalLine, LineInput};
use crate::error::{LedgerError, LedgerResult};

/// Most decimal places an amount may carry. Stored amounts keep exactly this many.
pub const MAX_AMOUNT_SCALE: u32 = 4;

/// A journal entry under construction.
#[derive(Debug, Clone)]
pub struct JournalDraft {
    meta: EntryMeta,
    lines: Vec<LineInput>,
    closing_period_id: Option<PeriodId>,
    reversal_of: Option<JournalEntryId>,
}

impl JournalDraft {
    /// Builds the aggregate.
    ///
    /// Fails with `EmptyLines` below two lines and `InvalidLine` when a line is
    /// negative, has more than [`MAX_AMOUNT_SCALE`] decimal places, or does not
    /// carry exactly one side. Balance is checked at posting time, not here.
    pub fn new(meta: EntryMeta, lines: Vec<LineInput>) -> LedgerResult<Self> {
        if meta.code.trim().is_empty() {
            return Err(LedgerError::Validation("entry code is required".into()));
        }
        if lines.len() < 2 {
            return Err(LedgerError::EmptyLines(lines.len()));
        }
        for (index, line) in lines.iter().enumerate() {
            check_line(index + 1, line)?;
        }
        Ok(Self {
            meta,
            lines,
            closing_period_id: None,
            reversal_of: None,
        })
    }

    /// Marks the draft as the closing entry of a period.
    #[must_use]
    pub(crate) fn closing(mut self, period_id: PeriodId) -> Self {
        self.closing_period_id = Some(period_id);
        self
    }

    /// Marks the draft as the reversal of another entry.
    #[must_use]
    pub(crate) fn reversing(mut self, original: JournalEntryId) -> Self {
        self.reversal_of = Some(original);
        self
    }

    /// Header fields.
    #[must_use]
    pub fn meta(&self) -> &EntryMeta {
        &self.meta
    }

    /// Lines in order.
    #[must_use]
    pub fn lines(&self) -> &[LineInput] {
        &self.lines
    }

    /// Debit and credit sums.
    #[must_use]
    pub fn totals(&self) -> EntryTotals {
        EntryTotals::from_amounts(self.lines.iter().map(|l| (l.debit, l.credit)))
    }

    /// Turns the draft into storable records with fresh ids.
    pub(crate) fn into_records(self, now: DateTime<Utc>) -> (JournalEntry, Vec<JournalLine>) {
        let totals = self.totals();
        let entry_id = JournalEntryId::new();
        let lines = self
            .lines
            .into_iter()
            .zip(1..)
            .map(|(input, line_number)| JournalLine {
                id: JournalLineId::new(),
                entry_id,
                account_id: input.account_id,
                debit: input.debit,
                credit: input.credit,
                description: input.description,
                line_number,
            })
            .collect();
        let entry = JournalEntry {
            id: entry_id,
            code: self.meta.code,
            entry_date: self.meta.entry_date,
            description: self.meta.description,
            status: EntryStatus::Draft,
            total_debit: totals.debit,
            total_credit: totals.credit,
            source: self.meta.source,
            closing_period_id: self.closing_period_id,
            reversal_of: self.reversal_of,
            created_at: now,
            posted_at: None,
            cancelled_at: None,
        };
        (entry, lines)
    }
}

fn check_line(line: usize, input: &LineInput) -> LedgerResult<()> {
    let invalid = |reason: &str| LedgerError::InvalidLine {
        line,
        reason: reason.to_string(),
    };
    if input.debit < Decimal::ZERO || input.credit < Decimal::ZERO {
        return Err(invalid("amounts cannot be negative"));
    }
    if input.debit.normalize().scale() > MAX_AMOUNT_SCALE
        || input.credit.normalize().scale() > MAX_AMOUNT_SCALE
    {
        return Err(invalid("amounts carry at most 4 decimal places"));
    }
    match (input.debit.is_zero(), input.credit.is_zero()) {
        (false, false) => Err(invalid("a line carries either a debit or a credit, not both")),
        (true, true) => Err(invalid("a line must carry a non-zero amount")),
        _ => Ok(()),
    }
}
