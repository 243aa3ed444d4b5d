//! In-memory ledger store.
//!
//! Transactions are serialized: a transaction holds the store mutex from
//! `begin` until it is committed or dropped, and works on a private copy of
//! the state. Commit swaps the copy in; dropping discards it. Because only one
//! transaction runs at a time, the period locks are no-ops here.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use buku_shared::types::{
    AccountId, DifferenceId, JournalEntryId, PeriodId, ReconciliationId, SnapshotId,
};
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{LedgerStore, LedgerTx, LineQuery};
use crate::accounts::Account;
use crate::audit::AuditRecord;
use crate::balance::{AccountTotals, aggregate_lines};
use crate::closing::AccountingPeriod;
use crate::error::{LedgerError, LedgerResult};
use crate::journal::{EntryStatus, JournalEntry, JournalLine, PostedLine};
use crate::reconciliation::{
    Reconciliation, ReconciliationDifference, ReconciliationSnapshot, TransactionSnapshot,
};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<JournalEntryId, JournalEntry>,
    lines: BTreeMap<JournalEntryId, Vec<JournalLine>>,
    periods: BTreeMap<PeriodId, AccountingPeriod>,
    snapshots: BTreeMap<SnapshotId, ReconciliationSnapshot>,
    snapshot_rows: BTreeMap<SnapshotId, Vec<TransactionSnapshot>>,
    reconciliations: BTreeMap<ReconciliationId, Reconciliation>,
    differences: BTreeMap<ReconciliationId, Vec<ReconciliationDifference>>,
    audit: Vec<AuditRecord>,
}

impl LedgerState {
    fn posted_lines(&self, query: &LineQuery) -> Vec<PostedLine> {
        let mut out: Vec<PostedLine> = self
            .entries
            .values()
            .filter(|e| e.is_posted())
            .filter_map(|e| e.posted_at.map(|posted_at| (e, posted_at)))
            .flat_map(|(entry, posted_at)| {
                self.lines
                    .get(&entry.id)
                    .into_iter()
                    .flatten()
                    .filter(|line| query.matches(line.account_id, entry.entry_date))
                    .map(move |line| PostedLine {
                        entry_id: entry.id,
                        entry_code: entry.code.clone(),
                        entry_date: entry.entry_date,
                        entry_description: entry.description.clone(),
                        posted_at,
                        line: line.clone(),
                    })
            })
            .collect();
        out.sort_by(|a, b| {
            (a.entry_date, a.posted_at, a.entry_id, a.line.line_number).cmp(&(
                b.entry_date,
                b.posted_at,
                b.entry_id,
                b.line.line_number,
            ))
        });
        out
    }
}

/// Ledger store kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrites a frozen row behind the ledger's back.
    #[cfg(test)]
    pub(crate) async fn tamper_snapshot_row<F>(&self, snapshot_id: SnapshotId, line_number: i32, edit: F)
    where
        F: FnOnce(&mut TransactionSnapshot),
    {
        let mut state = self.state.lock().await;
        if let Some(row) = state
            .snapshot_rows
            .get_mut(&snapshot_id)
            .and_then(|rows| rows.iter_mut().find(|r| r.line_number == line_number))
        {
            edit(row);
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> LedgerResult<Box<dyn LedgerTx>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<LedgerState>,
    work: LedgerState,
}

fn missing(entity: &'static str, key: impl ToString) -> LedgerError {
    LedgerError::not_found(entity, key)
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_date_shared(&mut self, _date: NaiveDate) -> LedgerResult<()> {
        Ok(())
    }

    async fn lock_range_exclusive(&mut self, _start: NaiveDate, _end: NaiveDate) -> LedgerResult<()> {
        Ok(())
    }

    async fn insert_account(&mut self, account: &Account) -> LedgerResult<()> {
        if account.is_active()
            && self
                .work
                .accounts
                .values()
                .any(|a| a.is_active() && a.code == account.code)
        {
            return Err(LedgerError::DuplicateCode(account.code.clone()));
        }
        self.work.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        let slot = self
            .work
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| missing("account", account.id))?;
        *slot = account.clone();
        Ok(())
    }

    async fn account(&mut self, id: AccountId) -> LedgerResult<Option<Account>> {
        Ok(self.work.accounts.get(&id).cloned())
    }

    async fn active_account_by_code(&mut self, code: &str) -> LedgerResult<Option<Account>> {
        Ok(self
            .work
            .accounts
            .values()
            .find(|a| a.is_active() && a.code == code)
            .cloned())
    }

    async fn accounts(&mut self) -> LedgerResult<Vec<Account>> {
        let mut accounts: Vec<Account> = self.work.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    async fn insert_entry(&mut self, entry: &JournalEntry, lines: &[JournalLine]) -> LedgerResult<()> {
        if let Some(original) = entry.reversal_of
            && self.work.entries.values().any(|e| e.reversal_of == Some(original))
        {
            return Err(LedgerError::AlreadyReversed(original));
        }
        self.work.entries.insert(entry.id, entry.clone());
        self.work.lines.insert(entry.id, lines.to_vec());
        Ok(())
    }

    async fn update_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        let slot = self
            .work
            .entries
            .get_mut(&entry.id)
            .ok_or_else(|| missing("journal entry", entry.id))?;
        *slot = entry.clone();
        Ok(())
    }

    async fn delete_lines(&mut self, entry_id: JournalEntryId) -> LedgerResult<()> {
        self.work.lines.remove(&entry_id);
        Ok(())
    }

    async fn entry(&mut self, id: JournalEntryId) -> LedgerResult<Option<JournalEntry>> {
        Ok(self.work.entries.get(&id).cloned())
    }

    async fn lines(&mut self, entry_id: JournalEntryId) -> LedgerResult<Vec<JournalLine>> {
        let mut lines = self.work.lines.get(&entry_id).cloned().unwrap_or_default();
        lines.sort_by_key(|l| l.line_number);
        Ok(lines)
    }

    async fn reversal_of(&mut self, id: JournalEntryId) -> LedgerResult<Option<JournalEntry>> {
        Ok(self
            .work
            .entries
            .values()
            .find(|e| e.reversal_of == Some(id))
            .cloned())
    }

    async fn posted_lines(&mut self, query: &LineQuery) -> LedgerResult<Vec<PostedLine>> {
        Ok(self.work.posted_lines(query))
    }

    async fn posted_totals(&mut self, query: &LineQuery) -> LedgerResult<Vec<AccountTotals>> {
        let posted = self.work.posted_lines(query);
        Ok(aggregate_lines(posted.iter().map(|p| &p.line)))
    }

    async fn count_posted_entries(&mut self, from: NaiveDate, to: NaiveDate) -> LedgerResult<u64> {
        let count = self
            .work
            .entries
            .values()
            .filter(|e| e.is_posted() && e.entry_date >= from && e.entry_date <= to)
            .count();
        Ok(count as u64)
    }

    async fn count_draft_entries(&mut self, from: NaiveDate, to: NaiveDate) -> LedgerResult<u64> {
        let count = self
            .work
            .entries
            .values()
            .filter(|e| e.status == EntryStatus::Draft && e.entry_date >= from && e.entry_date <= to)
            .count();
        Ok(count as u64)
    }

    async fn earliest_posted_date(&mut self) -> LedgerResult<Option<NaiveDate>> {
        Ok(self
            .work
            .entries
            .values()
            .filter(|e| e.is_posted())
            .map(|e| e.entry_date)
            .min())
    }

    async fn insert_period(&mut self, period: &AccountingPeriod) -> LedgerResult<()> {
        self.work.periods.insert(period.id, period.clone());
        Ok(())
    }

    async fn update_period(&mut self, period: &AccountingPeriod) -> LedgerResult<()> {
        let slot = self
            .work
            .periods
            .get_mut(&period.id)
            .ok_or_else(|| missing("period", period.id))?;
        *slot = period.clone();
        Ok(())
    }

    async fn period(&mut self, id: PeriodId) -> LedgerResult<Option<AccountingPeriod>> {
        Ok(self.work.periods.get(&id).cloned())
    }

    async fn periods(&mut self) -> LedgerResult<Vec<AccountingPeriod>> {
        let mut periods: Vec<AccountingPeriod> = self.work.periods.values().cloned().collect();
        periods.sort_by_key(|p| (p.start_date, p.closed_at));
        Ok(periods)
    }

    async fn insert_snapshot(
        &mut self,
        snapshot: &ReconciliationSnapshot,
        rows: &[TransactionSnapshot],
    ) -> LedgerResult<()> {
        self.work.snapshots.insert(snapshot.id, snapshot.clone());
        self.work.snapshot_rows.insert(snapshot.id, rows.to_vec());
        Ok(())
    }

    async fn update_snapshot(&mut self, snapshot: &ReconciliationSnapshot) -> LedgerResult<()> {
        let slot = self
            .work
            .snapshots
            .get_mut(&snapshot.id)
            .ok_or_else(|| missing("snapshot", snapshot.id))?;
        *slot = snapshot.clone();
        Ok(())
    }

    async fn replace_snapshot_rows(
        &mut self,
        snapshot_id: SnapshotId,
        rows: &[TransactionSnapshot],
    ) -> LedgerResult<()> {
        self.work.snapshot_rows.insert(snapshot_id, rows.to_vec());
        Ok(())
    }

    async fn snapshot(&mut self, id: SnapshotId) -> LedgerResult<Option<ReconciliationSnapshot>> {
        Ok(self.work.snapshots.get(&id).cloned())
    }

    async fn snapshot_rows(&mut self, snapshot_id: SnapshotId) -> LedgerResult<Vec<TransactionSnapshot>> {
        let mut rows = self
            .work
            .snapshot_rows
            .get(&snapshot_id)
            .cloned()
            .unwrap_or_default();
        rows.sort_by_key(|r| r.line_number);
        Ok(rows)
    }

    async fn snapshots_for(&mut self, account_id: AccountId) -> LedgerResult<Vec<ReconciliationSnapshot>> {
        let mut snapshots: Vec<ReconciliationSnapshot> = self
            .work
            .snapshots
            .values()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect();
        snapshots.sort_by(|a, b| b.captured_at.cmp(&a.captured_at).then(b.id.cmp(&a.id)));
        Ok(snapshots)
    }

    async fn insert_reconciliation(
        &mut self,
        reconciliation: &Reconciliation,
        differences: &[ReconciliationDifference],
    ) -> LedgerResult<()> {
        self.work
            .reconciliations
            .insert(reconciliation.id, reconciliation.clone());
        self.work
            .differences
            .insert(reconciliation.id, differences.to_vec());
        Ok(())
    }

    async fn update_reconciliation(&mut self, reconciliation: &Reconciliation) -> LedgerResult<()> {
        let slot = self
            .work
            .reconciliations
            .get_mut(&reconciliation.id)
            .ok_or_else(|| missing("reconciliation", reconciliation.id))?;
        *slot = reconciliation.clone();
        Ok(())
    }

    async fn reconciliation(&mut self, id: ReconciliationId) -> LedgerResult<Option<Reconciliation>> {
        Ok(self.work.reconciliations.get(&id).cloned())
    }

    async fn differences(
        &mut self,
        reconciliation_id: ReconciliationId,
    ) -> LedgerResult<Vec<ReconciliationDifference>> {
        Ok(self
            .work
            .differences
            .get(&reconciliation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn difference(&mut self, id: DifferenceId) -> LedgerResult<Option<ReconciliationDifference>> {
        Ok(self
            .work
            .differences
            .values()
            .flatten()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn update_difference(&mut self, difference: &ReconciliationDifference) -> LedgerResult<()> {
        let slot = self
            .work
            .differences
            .get_mut(&difference.reconciliation_id)
            .and_then(|diffs| diffs.iter_mut().find(|d| d.id == difference.id))
            .ok_or_else(|| missing("difference", difference.id))?;
        *slot = difference.clone();
        Ok(())
    }

    async fn append_audit(&mut self, record: &AuditRecord) -> LedgerResult<()> {
        self.work.audit.push(record.clone());
        Ok(())
    }

    async fn audit_trail(&mut self, entity_id: Uuid) -> LedgerResult<Vec<AuditRecord>> {
        Ok(self
            .work
            .audit
            .iter()
            .filter(|r| r.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        let Self { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
