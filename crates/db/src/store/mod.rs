//! PostgreSQL implementation of the ledger persistence seam.
//!
//! Every [`LedgerTx`] wraps one database transaction. Period locks are
//! transaction-scoped advisory locks keyed by calendar month, so they are
//! released on commit or rollback without any bookkeeping here.

mod convert;

use std::time::Duration;

use async_trait::async_trait;
use buku_core::accounts::{Account, AccountStatus};
use buku_core::audit::AuditRecord;
use buku_core::balance::AccountTotals;
use buku_core::closing::AccountingPeriod;
use buku_core::journal::{EntryStatus, JournalEntry, JournalLine, PostedLine};
use buku_core::reconciliation::{
    Reconciliation, ReconciliationDifference, ReconciliationSnapshot, TransactionSnapshot,
};
use buku_core::store::{LedgerStore, LedgerTx, LineQuery};
use buku_core::{LedgerError, LedgerResult};
use buku_shared::types::{
    AccountId, DifferenceId, JournalEntryId, PeriodId, ReconciliationId, SnapshotId,
};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbBackend, DbErr, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Statement,
    TransactionTrait,
};
use uuid::Uuid;

use crate::entities::{
    accounting_periods, accounts, audit_log, journal_entries, journal_lines,
    reconciliation_differences, reconciliation_snapshots, reconciliations, transaction_snapshots,
};
use crate::error::{db_err, violates_unique};

/// First key of every advisory lock taken by the ledger.
const LEDGER_LOCK_CLASS: i32 = 0x4255_4B55;

/// How long a transaction waits for a lock before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const ACTIVE_CODE_INDEX: &str = "uq_accounts_active_code";
const ONE_REVERSAL_INDEX: &str = "uq_journal_entries_reversal_of";
const ACTIVE_SNAPSHOT_INDEX: &str = "uq_snapshots_active";

/// Ledger store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
    lock_timeout: Duration,
}

impl PgLedgerStore {
    /// Creates a new store over an open connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Sets how long a transaction waits on a period lock.
    #[must_use]
    pub const fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> LedgerResult<Box<dyn LedgerTx>> {
        let txn = self.db.begin().await.map_err(db_err)?;
        txn.execute_unprepared(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        ))
        .await
        .map_err(db_err)?;
        Ok(Box::new(PgLedgerTx { txn }))
    }
}

/// One PostgreSQL transaction.
pub struct PgLedgerTx {
    txn: DatabaseTransaction,
}

/// Lock key of the calendar month containing `date`.
fn month_key(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0().cast_signed()
}

/// Keeps only posted lines matching the query. Expects `journal_entries` joined.
fn posted_condition(query: &LineQuery) -> Condition {
    let mut condition =
        Condition::all().add(journal_entries::Column::Status.eq(EntryStatus::Posted.as_str()));
    if let Some(accounts) = &query.accounts {
        condition = condition.add(
            journal_lines::Column::AccountId.is_in(accounts.iter().map(|id| id.into_inner())),
        );
    }
    if let Some(from) = query.from {
        condition = condition.add(journal_entries::Column::EntryDate.gte(from));
    }
    if let Some(to) = query.to {
        condition = condition.add(journal_entries::Column::EntryDate.lte(to));
    }
    condition
}

/// Turns "no row matched" on an update into a domain not-found.
fn updated(entity: &'static str, id: impl ToString) -> impl FnOnce(DbErr) -> LedgerError {
    move |err| match err {
        DbErr::RecordNotUpdated => LedgerError::not_found(entity, id),
        other => db_err(other),
    }
}

#[derive(Debug, FromQueryResult)]
struct PostedLineRow {
    id: Uuid,
    entry_id: Uuid,
    account_id: Uuid,
    debit: Decimal,
    credit: Decimal,
    description: Option<String>,
    line_number: i32,
    entry_code: String,
    entry_date: NaiveDate,
    entry_description: String,
    posted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Debug, FromQueryResult)]
struct TotalsRow {
    account_id: Uuid,
    debit: Option<Decimal>,
    credit: Option<Decimal>,
}

impl PgLedgerTx {
    async fn advisory_lock(&self, function: &str, key: i32) -> LedgerResult<()> {
        self.txn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                format!("SELECT {function}($1, $2)"),
                [LEDGER_LOCK_CLASS.into(), key.into()],
            ))
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn insert_lines(&self, lines: &[JournalLine]) -> LedgerResult<()> {
        if lines.is_empty() {
            return Ok(());
        }
        journal_lines::Entity::insert_many(lines.iter().map(convert::line_row))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn insert_frozen_rows(&self, rows: &[TransactionSnapshot]) -> LedgerResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        transaction_snapshots::Entity::insert_many(rows.iter().map(convert::frozen_row))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_date_shared(&mut self, date: NaiveDate) -> LedgerResult<()> {
        self.advisory_lock("pg_advisory_xact_lock_shared", month_key(date))
            .await
    }

    async fn lock_range_exclusive(&mut self, start: NaiveDate, end: NaiveDate) -> LedgerResult<()> {
        // Always ascending.
        for key in month_key(start)..=month_key(end) {
            self.advisory_lock("pg_advisory_xact_lock", key).await?;
        }
        Ok(())
    }

    // ========== Accounts ==========

    async fn insert_account(&mut self, account: &Account) -> LedgerResult<()> {
        accounts::Entity::insert(convert::account_row(account)?)
            .exec(&self.txn)
            .await
            .map_err(|e| {
                if violates_unique(&e, ACTIVE_CODE_INDEX) {
                    LedgerError::DuplicateCode(account.code.clone())
                } else {
                    db_err(e)
                }
            })?;
        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        convert::account_row(account)?
            .update(&self.txn)
            .await
            .map_err(updated("account", account.id))?;
        Ok(())
    }

    async fn account(&mut self, id: AccountId) -> LedgerResult<Option<Account>> {
        accounts::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(db_err)?
            .map(convert::account)
            .transpose()
    }

    async fn active_account_by_code(&mut self, code: &str) -> LedgerResult<Option<Account>> {
        let active = convert::encode("status", &AccountStatus::Active)?;
        accounts::Entity::find()
            .filter(accounts::Column::Code.eq(code))
            .filter(accounts::Column::Status.eq(active))
            .one(&self.txn)
            .await
            .map_err(db_err)?
            .map(convert::account)
            .transpose()
    }

    async fn accounts(&mut self) -> LedgerResult<Vec<Account>> {
        accounts::Entity::find()
            .order_by_asc(accounts::Column::Code)
            .order_by_asc(accounts::Column::CreatedAt)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(convert::account)
            .collect()
    }

    // ========== Journal ==========

    async fn insert_entry(&mut self, entry: &JournalEntry, lines: &[JournalLine]) -> LedgerResult<()> {
        journal_entries::Entity::insert(convert::entry_row(entry)?)
            .exec(&self.txn)
            .await
            .map_err(|e| match entry.reversal_of {
                Some(original) if violates_unique(&e, ONE_REVERSAL_INDEX) => {
                    LedgerError::AlreadyReversed(original)
                }
                _ => db_err(e),
            })?;
        self.insert_lines(lines).await
    }

    async fn update_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        convert::entry_row(entry)?
            .update(&self.txn)
            .await
            .map_err(updated("journal entry", entry.id))?;
        Ok(())
    }

    async fn delete_lines(&mut self, entry_id: JournalEntryId) -> LedgerResult<()> {
        journal_lines::Entity::delete_many()
            .filter(journal_lines::Column::EntryId.eq(entry_id.into_inner()))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn entry(&mut self, id: JournalEntryId) -> LedgerResult<Option<JournalEntry>> {
        journal_entries::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(db_err)?
            .map(convert::entry)
            .transpose()
    }

    async fn lines(&mut self, entry_id: JournalEntryId) -> LedgerResult<Vec<JournalLine>> {
        Ok(journal_lines::Entity::find()
            .filter(journal_lines::Column::EntryId.eq(entry_id.into_inner()))
            .order_by_asc(journal_lines::Column::LineNumber)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(convert::line)
            .collect())
    }

    async fn reversal_of(&mut self, id: JournalEntryId) -> LedgerResult<Option<JournalEntry>> {
        journal_entries::Entity::find()
            .filter(journal_entries::Column::ReversalOf.eq(id.into_inner()))
            .one(&self.txn)
            .await
            .map_err(db_err)?
            .map(convert::entry)
            .transpose()
    }

    async fn posted_lines(&mut self, query: &LineQuery) -> LedgerResult<Vec<PostedLine>> {
        let rows = journal_lines::Entity::find()
            .join(JoinType::InnerJoin, journal_lines::Relation::JournalEntries.def())
            .column_as(journal_entries::Column::Code, "entry_code")
            .column_as(journal_entries::Column::EntryDate, "entry_date")
            .column_as(journal_entries::Column::Description, "entry_description")
            .column_as(journal_entries::Column::PostedAt, "posted_at")
            .filter(posted_condition(query))
            .order_by_asc(journal_entries::Column::EntryDate)
            .order_by_asc(journal_entries::Column::PostedAt)
            .order_by_asc(journal_entries::Column::Id)
            .order_by_asc(journal_lines::Column::LineNumber)
            .into_model::<PostedLineRow>()
            .all(&self.txn)
            .await
            .map_err(db_err)?;

        rows.into_iter()
            .map(|row| {
                let posted_at = row.posted_at.ok_or_else(|| {
                    LedgerError::Storage(format!("Posted entry {} has no posting time", row.entry_id))
                })?;
                Ok(PostedLine {
                    entry_id: row.entry_id.into(),
                    entry_code: row.entry_code,
                    entry_date: row.entry_date,
                    entry_description: row.entry_description,
                    posted_at: posted_at.to_utc(),
                    line: JournalLine {
                        id: row.id.into(),
                        entry_id: row.entry_id.into(),
                        account_id: row.account_id.into(),
                        debit: row.debit,
                        credit: row.credit,
                        description: row.description,
                        line_number: row.line_number,
                    },
                })
            })
            .collect()
    }

    async fn posted_totals(&mut self, query: &LineQuery) -> LedgerResult<Vec<AccountTotals>> {
        let rows = journal_lines::Entity::find()
            .select_only()
            .column(journal_lines::Column::AccountId)
            .column_as(
                Expr::col((journal_lines::Entity, journal_lines::Column::Debit)).sum(),
                "debit",
            )
            .column_as(
                Expr::col((journal_lines::Entity, journal_lines::Column::Credit)).sum(),
                "credit",
            )
            .join(JoinType::InnerJoin, journal_lines::Relation::JournalEntries.def())
            .filter(posted_condition(query))
            .group_by(journal_lines::Column::AccountId)
            .order_by_asc(journal_lines::Column::AccountId)
            .into_model::<TotalsRow>()
            .all(&self.txn)
            .await
            .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|row| AccountTotals {
                account_id: row.account_id.into(),
                debit: row.debit.unwrap_or_default(),
                credit: row.credit.unwrap_or_default(),
            })
            .collect())
    }

    async fn count_posted_entries(&mut self, from: NaiveDate, to: NaiveDate) -> LedgerResult<u64> {
        journal_entries::Entity::find()
            .filter(journal_entries::Column::Status.eq(EntryStatus::Posted.as_str()))
            .filter(journal_entries::Column::EntryDate.gte(from))
            .filter(journal_entries::Column::EntryDate.lte(to))
            .count(&self.txn)
            .await
            .map_err(db_err)
    }

    async fn count_draft_entries(&mut self, from: NaiveDate, to: NaiveDate) -> LedgerResult<u64> {
        journal_entries::Entity::find()
            .filter(journal_entries::Column::Status.eq(EntryStatus::Draft.as_str()))
            .filter(journal_entries::Column::EntryDate.gte(from))
            .filter(journal_entries::Column::EntryDate.lte(to))
            .count(&self.txn)
            .await
            .map_err(db_err)
    }

    async fn earliest_posted_date(&mut self) -> LedgerResult<Option<NaiveDate>> {
        journal_entries::Entity::find()
            .select_only()
            .column(journal_entries::Column::EntryDate)
            .filter(journal_entries::Column::Status.eq(EntryStatus::Posted.as_str()))
            .order_by_asc(journal_entries::Column::EntryDate)
            .into_tuple::<NaiveDate>()
            .one(&self.txn)
            .await
            .map_err(db_err)
    }

    // ========== Periods ==========

    async fn insert_period(&mut self, period: &AccountingPeriod) -> LedgerResult<()> {
        accounting_periods::Entity::insert(convert::period_row(period))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_period(&mut self, period: &AccountingPeriod) -> LedgerResult<()> {
        convert::period_row(period)
            .update(&self.txn)
            .await
            .map_err(updated("period", period.id))?;
        Ok(())
    }

    async fn period(&mut self, id: PeriodId) -> LedgerResult<Option<AccountingPeriod>> {
        accounting_periods::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(db_err)?
            .map(convert::period)
            .transpose()
    }

    async fn periods(&mut self) -> LedgerResult<Vec<AccountingPeriod>> {
        accounting_periods::Entity::find()
            .order_by_asc(accounting_periods::Column::StartDate)
            .order_by_asc(accounting_periods::Column::ClosedAt)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(convert::period)
            .collect()
    }

    // ========== Reconciliation ==========

    async fn insert_snapshot(
        &mut self,
        snapshot: &ReconciliationSnapshot,
        rows: &[TransactionSnapshot],
    ) -> LedgerResult<()> {
        reconciliation_snapshots::Entity::insert(convert::snapshot_row(snapshot)?)
            .exec(&self.txn)
            .await
            .map_err(|e| {
                // A capture of the same account and month committed first.
                if violates_unique(&e, ACTIVE_SNAPSHOT_INDEX) {
                    LedgerError::Concurrency(format!(
                        "snapshot of account {} for {} was captured concurrently",
                        snapshot.account_id, snapshot.period
                    ))
                } else {
                    db_err(e)
                }
            })?;
        self.insert_frozen_rows(rows).await
    }

    async fn update_snapshot(&mut self, snapshot: &ReconciliationSnapshot) -> LedgerResult<()> {
        convert::snapshot_row(snapshot)?
            .update(&self.txn)
            .await
            .map_err(updated("snapshot", snapshot.id))?;
        Ok(())
    }

    async fn replace_snapshot_rows(
        &mut self,
        snapshot_id: SnapshotId,
        rows: &[TransactionSnapshot],
    ) -> LedgerResult<()> {
        transaction_snapshots::Entity::delete_many()
            .filter(transaction_snapshots::Column::SnapshotId.eq(snapshot_id.into_inner()))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        self.insert_frozen_rows(rows).await
    }

    async fn snapshot(&mut self, id: SnapshotId) -> LedgerResult<Option<ReconciliationSnapshot>> {
        reconciliation_snapshots::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(db_err)?
            .map(convert::snapshot)
            .transpose()
    }

    async fn snapshot_rows(&mut self, snapshot_id: SnapshotId) -> LedgerResult<Vec<TransactionSnapshot>> {
        Ok(transaction_snapshots::Entity::find()
            .filter(transaction_snapshots::Column::SnapshotId.eq(snapshot_id.into_inner()))
            .order_by_asc(transaction_snapshots::Column::LineNumber)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(convert::frozen)
            .collect())
    }

    async fn snapshots_for(&mut self, account_id: AccountId) -> LedgerResult<Vec<ReconciliationSnapshot>> {
        reconciliation_snapshots::Entity::find()
            .filter(reconciliation_snapshots::Column::AccountId.eq(account_id.into_inner()))
            .order_by_desc(reconciliation_snapshots::Column::CapturedAt)
            .order_by_desc(reconciliation_snapshots::Column::Id)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(convert::snapshot)
            .collect()
    }

    async fn insert_reconciliation(
        &mut self,
        reconciliation: &Reconciliation,
        differences: &[ReconciliationDifference],
    ) -> LedgerResult<()> {
        reconciliations::Entity::insert(convert::reconciliation_row(reconciliation)?)
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        if differences.is_empty() {
            return Ok(());
        }
        let rows = differences
            .iter()
            .zip(0..)
            .map(|(difference, position)| convert::difference_row(difference, Some(position)))
            .collect::<LedgerResult<Vec<_>>>()?;
        reconciliation_differences::Entity::insert_many(rows)
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_reconciliation(&mut self, reconciliation: &Reconciliation) -> LedgerResult<()> {
        convert::reconciliation_row(reconciliation)?
            .update(&self.txn)
            .await
            .map_err(updated("reconciliation", reconciliation.id))?;
        Ok(())
    }

    async fn reconciliation(&mut self, id: ReconciliationId) -> LedgerResult<Option<Reconciliation>> {
        reconciliations::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(db_err)?
            .map(convert::reconciliation)
            .transpose()
    }

    async fn differences(
        &mut self,
        reconciliation_id: ReconciliationId,
    ) -> LedgerResult<Vec<ReconciliationDifference>> {
        reconciliation_differences::Entity::find()
            .filter(
                reconciliation_differences::Column::ReconciliationId.eq(reconciliation_id.into_inner()),
            )
            .order_by_asc(reconciliation_differences::Column::Position)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(convert::difference)
            .collect()
    }

    async fn difference(&mut self, id: DifferenceId) -> LedgerResult<Option<ReconciliationDifference>> {
        reconciliation_differences::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(db_err)?
            .map(convert::difference)
            .transpose()
    }

    async fn update_difference(&mut self, difference: &ReconciliationDifference) -> LedgerResult<()> {
        convert::difference_row(difference, None)?
            .update(&self.txn)
            .await
            .map_err(updated("difference", difference.id))?;
        Ok(())
    }

    // ========== Audit ==========

    async fn append_audit(&mut self, record: &AuditRecord) -> LedgerResult<()> {
        audit_log::Entity::insert(convert::audit_row(record)?)
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn audit_trail(&mut self, entity_id: Uuid) -> LedgerResult<Vec<AuditRecord>> {
        audit_log::Entity::find()
            .filter(audit_log::Column::EntityId.eq(entity_id))
            .order_by_asc(audit_log::Column::RecordedAt)
            .order_by_asc(audit_log::Column::Id)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(convert::audit)
            .collect()
    }

    // ========== Completion ==========

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        self.txn.commit().await.map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_keys_are_contiguous_across_years() {
        assert_eq!(month_key(date(2026, 1, 1)), month_key(date(2025, 12, 31)) + 1);
        assert_eq!(month_key(date(2026, 1, 1)), month_key(date(2026, 1, 31)));
        assert_eq!(month_key(date(2026, 12, 15)) - month_key(date(2026, 1, 15)), 11);
    }
}
