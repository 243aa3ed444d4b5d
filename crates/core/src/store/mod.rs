//! Persistence seam.
//!
//! Services never hold a database handle. They open a [`LedgerTx`] from an
//! injected [`LedgerStore`], do their reads, checks and writes through it,
//! and commit. Dropping a transaction without committing discards its writes.

pub mod memory;

use async_trait::async_trait;
use buku_shared::types::{
    AccountId, DifferenceId, JournalEntryId, PeriodId, ReconciliationId, SnapshotId,
};
use chrono::NaiveDate;
use uuid::Uuid;

use crate::accounts::Account;
use crate::audit::AuditRecord;
use crate::balance::AccountTotals;
use crate::closing::AccountingPeriod;
use crate::error::LedgerResult;
use crate::journal::{JournalEntry, JournalLine, PostedLine};
use crate::reconciliation::{
    Reconciliation, ReconciliationDifference, ReconciliationSnapshot, TransactionSnapshot,
};

pub use memory::InMemoryLedgerStore;

/// Selects posted lines.
#[derive(Debug, Clone, Default)]
pub struct LineQuery {
    /// Only these accounts. `None` means all.
    pub accounts: Option<Vec<AccountId>>,
    /// Earliest entry date, inclusive.
    pub from: Option<NaiveDate>,
    /// Latest entry date, inclusive.
    pub to: Option<NaiveDate>,
}

impl LineQuery {
    /// Lines of one account.
    #[must_use]
    pub fn account(account_id: AccountId) -> Self {
        Self {
            accounts: Some(vec![account_id]),
            ..Self::default()
        }
    }

    /// Lines of several accounts.
    #[must_use]
    pub fn accounts(account_ids: &[AccountId]) -> Self {
        Self {
            accounts: Some(account_ids.to_vec()),
            ..Self::default()
        }
    }

    /// Lines dated within a range.
    #[must_use]
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            accounts: None,
            from: Some(from),
            to: Some(to),
        }
    }

    /// Lines dated on or after `from`.
    #[must_use]
    pub fn from(mut self, from: NaiveDate) -> Self {
        self.from = Some(from);
        self
    }

    /// Lines dated on or before `to`.
    #[must_use]
    pub fn up_to(mut self, to: Option<NaiveDate>) -> Self {
        self.to = to;
        self
    }

    /// Returns true if a line of `account_id` dated `date` is selected.
    #[must_use]
    pub fn matches(&self, account_id: AccountId, date: NaiveDate) -> bool {
        self.accounts.as_ref().is_none_or(|a| a.contains(&account_id))
            && self.from.is_none_or(|from| date >= from)
            && self.to.is_none_or(|to| date <= to)
    }
}

/// Opens ledger transactions.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Starts a transaction.
    async fn begin(&self) -> LedgerResult<Box<dyn LedgerTx>>;
}

/// One ledger transaction.
///
/// Reads see a consistent snapshot that includes the transaction's own writes.
/// Nothing is visible to others until [`LedgerTx::commit`].
#[async_trait]
pub trait LedgerTx: Send {
    // ========== Locks ==========

    /// Takes a shared lock on the period containing `date` until commit.
    ///
    /// Posts hold it, so posts into the same period run side by side but never
    /// alongside a close, reopen or lock of that period.
    async fn lock_date_shared(&mut self, date: NaiveDate) -> LedgerResult<()>;

    /// Takes an exclusive lock on every period touching `start..=end` until commit.
    async fn lock_range_exclusive(&mut self, start: NaiveDate, end: NaiveDate) -> LedgerResult<()>;

    // ========== Accounts ==========

    /// Stores a new account.
    async fn insert_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Overwrites an existing account.
    async fn update_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Loads an account by id.
    async fn account(&mut self, id: AccountId) -> LedgerResult<Option<Account>>;

    /// Loads the active account with the given code.
    async fn active_account_by_code(&mut self, code: &str) -> LedgerResult<Option<Account>>;

    /// Loads every account, active or not, ordered by code.
    async fn accounts(&mut self) -> LedgerResult<Vec<Account>>;

    // ========== Journal ==========

    /// Stores a new entry with its lines.
    async fn insert_entry(&mut self, entry: &JournalEntry, lines: &[JournalLine]) -> LedgerResult<()>;

    /// Overwrites an entry header.
    async fn update_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()>;

    /// Deletes the lines of an entry. Only used on drafts.
    async fn delete_lines(&mut self, entry_id: JournalEntryId) -> LedgerResult<()>;

    /// Loads an entry header.
    async fn entry(&mut self, id: JournalEntryId) -> LedgerResult<Option<JournalEntry>>;

    /// Loads the lines of an entry, ordered by line number.
    async fn lines(&mut self, entry_id: JournalEntryId) -> LedgerResult<Vec<JournalLine>>;

    /// Finds the entry reversing `id`, if any.
    async fn reversal_of(&mut self, id: JournalEntryId) -> LedgerResult<Option<JournalEntry>>;

    /// Posted lines matching the query, ordered by entry date, posting time,
    /// entry id, then line number.
    async fn posted_lines(&mut self, query: &LineQuery) -> LedgerResult<Vec<PostedLine>>;

    /// Debit and credit sums of posted lines per account.
    async fn posted_totals(&mut self, query: &LineQuery) -> LedgerResult<Vec<AccountTotals>>;

    /// Number of posted entries dated within the range.
    async fn count_posted_entries(&mut self, from: NaiveDate, to: NaiveDate) -> LedgerResult<u64>;

    /// Number of DRAFT entries dated within the range.
    async fn count_draft_entries(&mut self, from: NaiveDate, to: NaiveDate) -> LedgerResult<u64>;

    /// Date of the earliest posted entry.
    async fn earliest_posted_date(&mut self) -> LedgerResult<Option<NaiveDate>>;

    // ========== Periods ==========

    /// Stores a new period.
    async fn insert_period(&mut self, period: &AccountingPeriod) -> LedgerResult<()>;

    /// Overwrites a period.
    async fn update_period(&mut self, period: &AccountingPeriod) -> LedgerResult<()>;

    /// Loads a period.
    async fn period(&mut self, id: PeriodId) -> LedgerResult<Option<AccountingPeriod>>;

    /// Loads every period ordered by start date.
    async fn periods(&mut self) -> LedgerResult<Vec<AccountingPeriod>>;

    // ========== Reconciliation ==========

    /// Stores a snapshot with its frozen rows.
    async fn insert_snapshot(
        &mut self,
        snapshot: &ReconciliationSnapshot,
        rows: &[TransactionSnapshot],
    ) -> LedgerResult<()>;

    /// Overwrites a snapshot header.
    async fn update_snapshot(&mut self, snapshot: &ReconciliationSnapshot) -> LedgerResult<()>;

    /// Replaces the frozen rows of a snapshot.
    async fn replace_snapshot_rows(
        &mut self,
        snapshot_id: SnapshotId,
        rows: &[TransactionSnapshot],
    ) -> LedgerResult<()>;

    /// Loads a snapshot header.
    async fn snapshot(&mut self, id: SnapshotId) -> LedgerResult<Option<ReconciliationSnapshot>>;

    /// Loads the frozen rows of a snapshot, ordered by line number.
    async fn snapshot_rows(&mut self, snapshot_id: SnapshotId) -> LedgerResult<Vec<TransactionSnapshot>>;

    /// Loads the snapshots of an account, newest capture first.
    async fn snapshots_for(&mut self, account_id: AccountId) -> LedgerResult<Vec<ReconciliationSnapshot>>;

    /// Stores a reconciliation with its differences.
    async fn insert_reconciliation(
        &mut self,
        reconciliation: &Reconciliation,
        differences: &[ReconciliationDifference],
    ) -> LedgerResult<()>;

    /// Overwrites a reconciliation header.
    async fn update_reconciliation(&mut self, reconciliation: &Reconciliation) -> LedgerResult<()>;

    /// Loads a reconciliation.
    async fn reconciliation(&mut self, id: ReconciliationId) -> LedgerResult<Option<Reconciliation>>;

    /// Loads the differences of a reconciliation in recorded order.
    async fn differences(
        &mut self,
        reconciliation_id: ReconciliationId,
    ) -> LedgerResult<Vec<ReconciliationDifference>>;

    /// Loads one difference.
    async fn difference(&mut self, id: DifferenceId) -> LedgerResult<Option<ReconciliationDifference>>;

    /// Overwrites a difference.
    async fn update_difference(&mut self, difference: &ReconciliationDifference) -> LedgerResult<()>;

    // ========== Audit ==========

    /// Appends an audit record.
    async fn append_audit(&mut self, record: &AuditRecord) -> LedgerResult<()>;

    /// Loads the audit trail of a record, oldest first.
    async fn audit_trail(&mut self, entity_id: Uuid) -> LedgerResult<Vec<AuditRecord>>;

    // ========== Completion ==========

    /// Makes every write visible.
    async fn commit(self: Box<Self>) -> LedgerResult<()>;
}
