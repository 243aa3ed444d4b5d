//! Journal aggregate types.

use buku_shared::types::{AccountId, JournalEntryId, JournalLineId, PeriodId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Status of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    /// Built by a producer, not yet part of the ledger.
    Draft,
    /// Immutable history.
    Posted,
    /// Discarded draft. Never counted.
    Cancelled,
}

impl EntryStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Posted => "POSTED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business document that produced an entry (sale, purchase, payment, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Document kind, e.g. "SALE".
    pub doc_type: String,
    /// Document identifier in the producing module.
    pub doc_id: String,
}

impl SourceDocument {
    /// Creates a source document link.
    pub fn new(doc_type: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            doc_id: doc_id.into(),
        }
    }
}

/// Journal entry header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier.
    pub id: JournalEntryId,
    /// Human code, e.g. "JE-2026-0001".
    pub code: String,
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Narrative.
    pub description: String,
    /// Current status.
    pub status: EntryStatus,
    /// Sum of line debits.
    pub total_debit: Decimal,
    /// Sum of line credits.
    pub total_credit: Decimal,
    /// Producing document, if any.
    pub source: Option<SourceDocument>,
    /// Set on closing entries.
    pub closing_period_id: Option<PeriodId>,
    /// Set on reversing entries, points at the reversed entry.
    pub reversal_of: Option<JournalEntryId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When the entry became POSTED.
    pub posted_at: Option<DateTime<Utc>>,
    /// When a draft was discarded.
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl JournalEntry {
    /// Returns true if the entry counts toward balances.
    #[must_use]
    pub fn is_posted(&self) -> bool {
        self.status == EntryStatus::Posted
    }
}

/// One debit or credit against an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    /// Unique identifier.
    pub id: JournalLineId,
    /// Owning entry.
    pub entry_id: JournalEntryId,
    /// Referenced account.
    pub account_id: AccountId,
    /// Debit amount, zero on credit lines.
    pub debit: Decimal,
    /// Credit amount, zero on debit lines.
    pub credit: Decimal,
    /// Line narrative.
    pub description: Option<String>,
    /// 1-based position within the entry.
    pub line_number: i32,
}

/// An entry with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryWithLines {
    /// Header.
    pub entry: JournalEntry,
    /// Lines in order.
    pub lines: Vec<JournalLine>,
}

/// Header fields supplied by a producer.
#[derive(Debug, Clone)]
pub struct EntryMeta {
    /// Human code.
    pub code: String,
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Narrative.
    pub description: String,
    /// Producing document.
    pub source: Option<SourceDocument>,
}

impl EntryMeta {
    /// Creates header fields without a source document.
    pub fn new(code: impl Into<String>, entry_date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            entry_date,
            description: description.into(),
            source: None,
        }
    }

    /// Links the entry to a producing document.
    #[must_use]
    pub fn with_source(mut self, source: SourceDocument) -> Self {
        self.source = Some(source);
        self
    }
}

/// A line as supplied by a producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInput {
    /// Account to post against.
    pub account_id: AccountId,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Line narrative.
    pub description: Option<String>,
}

impl LineInput {
    /// A debit line.
    #[must_use]
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: Decimal::ZERO,
            description: None,
        }
    }

    /// A credit line.
    #[must_use]
    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: Decimal::ZERO,
            credit: amount,
            description: None,
        }
    }

    /// Attaches a narrative.
    #[must_use]
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Debit and credit sums of a line set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntryTotals {
    /// Sum of debits.
    pub debit: Decimal,
    /// Sum of credits.
    pub credit: Decimal,
}

impl EntryTotals {
    /// Sums raw (debit, credit) pairs.
    pub fn from_amounts<I>(amounts: I) -> Self
    where
        I: IntoIterator<Item = (Decimal, Decimal)>,
    {
        amounts
            .into_iter()
            .fold(Self::default(), |acc, (debit, credit)| Self {
                debit: acc.debit + debit,
                credit: acc.credit + credit,
            })
    }

    /// Exact comparison, no tolerance.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.debit == self.credit
    }
}

/// A posted line joined with its entry header, as read by balances and snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedLine {
    /// Owning entry.
    pub entry_id: JournalEntryId,
    /// Entry code, used as the transaction reference.
    pub entry_code: String,
    /// Entry date.
    pub entry_date: NaiveDate,
    /// Entry description.
    pub entry_description: String,
    /// When the entry was posted.
    pub posted_at: DateTime<Utc>,
    /// The line.
    pub line: JournalLine,
}

/// Filter for the read-only feed of posted entries.
#[derive(Debug, Clone, Default)]
pub struct PostedEntryFilter {
    /// Earliest entry date, inclusive.
    pub from: Option<NaiveDate>,
    /// Latest entry date, inclusive.
    pub to: Option<NaiveDate>,
    /// Only entries touching this account.
    pub account_id: Option<AccountId>,
}
