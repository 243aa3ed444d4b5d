//! Reconciliation snapshot service.
//!
//! Snapshots freeze one month of a cash/bank account's posted lines and seal
//! them with a hash. Comparisons re-verify both seals before diffing and never
//! repair a broken one.

use std::sync::Arc;

use buku_shared::types::{
    AccountId, DifferenceId, ReconciliationId, SnapshotId, TransactionSnapshotId,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, instrument, warn};

use super::diff::{RowDifference, diff_rows};
use super::hash::{SealHeader, seal, verify};
use super::types::{
    DifferenceKind, MonthPeriod, Reconciliation, ReconciliationDifference, ReconciliationReport,
    ReconciliationSnapshot, ReconciliationStatus, ResolutionStatus, SnapshotStatus, TransactionSnapshot,
};
use crate::accounts::{Account, AccountType};
use crate::audit::{AuditAction, AuditEntity, AuditRecord};
use crate::balance::{derive_balance, running_balances};
use crate::error::{LedgerError, LedgerResult};
use crate::store::{LedgerStore, LedgerTx, LineQuery};

/// Rows and totals frozen for one account and month.
struct Frozen {
    opening_balance: Decimal,
    closing_balance: Decimal,
    total_debit: Decimal,
    total_credit: Decimal,
    rows: Vec<TransactionSnapshot>,
}

fn count_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

async fn load_snapshot(tx: &mut dyn LedgerTx, id: SnapshotId) -> LedgerResult<ReconciliationSnapshot> {
    tx.snapshot(id)
        .await?
        .ok_or_else(|| LedgerError::not_found("snapshot", id))
}

async fn load_reconciliation(tx: &mut dyn LedgerTx, id: ReconciliationId) -> LedgerResult<Reconciliation> {
    tx.reconciliation(id)
        .await?
        .ok_or_else(|| LedgerError::not_found("reconciliation", id))
}

/// Loads an account and checks it can be reconciled.
async fn cash_account(tx: &mut dyn LedgerTx, id: AccountId) -> LedgerResult<Account> {
    let account = tx
        .account(id)
        .await?
        .ok_or_else(|| LedgerError::not_found("account", id))?;
    if account.account_type != AccountType::Asset {
        return Err(LedgerError::invalid_account(id, "only ASSET accounts can be reconciled"));
    }
    account.ensure_postable()?;
    Ok(account)
}

/// Reads the month's posted lines and computes running balances.
async fn freeze(
    tx: &mut dyn LedgerTx,
    account: &Account,
    month: MonthPeriod,
    snapshot_id: SnapshotId,
) -> LedgerResult<Frozen> {
    let opening_balance = match month.first_day().pred_opt() {
        Some(day_before) => derive_balance(tx, account, Some(day_before)).await?.balance,
        None => Decimal::ZERO,
    };

    let posted = tx
        .posted_lines(
            &LineQuery::account(account.id)
                .from(month.first_day())
                .up_to(Some(month.last_day())),
        )
        .await?;
    let running = running_balances(
        opening_balance,
        account.normal_balance(),
        posted.iter().map(|p| (p.line.debit, p.line.credit)),
    );

    let rows: Vec<TransactionSnapshot> = posted
        .into_iter()
        .zip(running)
        .map(|(p, balance)| TransactionSnapshot {
            id: TransactionSnapshotId::new(),
            snapshot_id,
            line_number: balance.sequence,
            entry_id: p.entry_id,
            entry_date: p.entry_date,
            reference: p.entry_code,
            description: p.line.description.unwrap_or(p.entry_description),
            debit: p.line.debit,
            credit: p.line.credit,
            running_balance: balance.current,
        })
        .collect();

    Ok(Frozen {
        opening_balance,
        closing_balance: rows.last().map_or(opening_balance, |r| r.running_balance),
        total_debit: rows.iter().map(|r| r.debit).sum(),
        total_credit: rows.iter().map(|r| r.credit).sum(),
        rows,
    })
}

fn to_difference(reconciliation_id: ReconciliationId, diff: RowDifference) -> ReconciliationDifference {
    ReconciliationDifference {
        id: DifferenceId::new(),
        reconciliation_id,
        kind: diff.kind,
        severity: diff.kind.severity(),
        reference: Some(diff.reference),
        field: diff.field.map(str::to_string),
        old_value: diff.old_value,
        new_value: diff.new_value,
        amount_difference: diff.amount_difference,
        resolution: ResolutionStatus::Pending,
        resolution_notes: None,
        resolved_at: None,
    }
}

/// Cash and bank reconciliation.
pub struct ReconciliationService<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> ReconciliationService<S> {
    /// Creates the service over a store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Freezes one month of an account's activity.
    ///
    /// The previous ACTIVE snapshot for the same account and month becomes
    /// SUPERSEDED.
    #[instrument(skip(self, notes))]
    pub async fn capture(
        &self,
        account_id: AccountId,
        period: &str,
        notes: Option<String>,
    ) -> LedgerResult<ReconciliationSnapshot> {
        let month: MonthPeriod = period.parse()?;

        let mut tx = self.store.begin().await?;
        let account = cash_account(tx.as_mut(), account_id).await?;
        let snapshot_id = SnapshotId::new();
        let frozen = freeze(tx.as_mut(), &account, month, snapshot_id).await?;

        let label = month.label();
        let mut snapshot = ReconciliationSnapshot {
            id: snapshot_id,
            account_id,
            period: label.clone(),
            snapshot_date: month.last_day(),
            captured_at: Utc::now(),
            opening_balance: frozen.opening_balance,
            closing_balance: frozen.closing_balance,
            total_debit: frozen.total_debit,
            total_credit: frozen.total_credit,
            transaction_count: count_i64(frozen.rows.len()),
            data_hash: String::new(),
            locked: false,
            locked_at: None,
            locked_by: None,
            status: SnapshotStatus::Active,
            notes,
        };
        snapshot.data_hash = seal(SealHeader::from(&snapshot), &frozen.rows);

        for mut previous in tx
            .snapshots_for(account_id)
            .await?
            .into_iter()
            .filter(|s| s.period == label && s.status == SnapshotStatus::Active)
        {
            previous.status = SnapshotStatus::Superseded;
            tx.update_snapshot(&previous).await?;
            tx.append_audit(&AuditRecord::new(
                AuditEntity::Snapshot,
                previous.id,
                AuditAction::Superseded,
                json!({ "superseded_by": snapshot_id }),
            ))
            .await?;
        }

        tx.insert_snapshot(&snapshot, &frozen.rows).await?;
        tx.append_audit(&AuditRecord::new(
            AuditEntity::Snapshot,
            snapshot_id,
            AuditAction::Created,
            json!({ "period": label, "hash": snapshot.data_hash, "rows": snapshot.transaction_count }),
        ))
        .await?;
        tx.commit().await?;

        info!(
            snapshot_id = %snapshot_id,
            account_id = %account_id,
            period = %snapshot.period,
            rows = snapshot.transaction_count,
            "Snapshot captured"
        );
        Ok(snapshot)
    }

    /// Locks a snapshot so its rows can never be recaptured.
    #[instrument(skip(self))]
    pub async fn lock(&self, id: SnapshotId, locked_by: &str) -> LedgerResult<ReconciliationSnapshot> {
        let mut tx = self.store.begin().await?;
        let mut snapshot = load_snapshot(tx.as_mut(), id).await?;
        if snapshot.locked {
            return Err(LedgerError::SnapshotLocked(id));
        }

        snapshot.locked = true;
        snapshot.locked_at = Some(Utc::now());
        snapshot.locked_by = Some(locked_by.to_string());
        tx.update_snapshot(&snapshot).await?;
        tx.append_audit(&AuditRecord::new(
            AuditEntity::Snapshot,
            id,
            AuditAction::Locked,
            json!({ "locked_by": locked_by }),
        ))
        .await?;
        tx.commit().await?;

        info!(snapshot_id = %id, locked_by, "Snapshot locked");
        Ok(snapshot)
    }

    /// Recaptures the rows of an unlocked ACTIVE snapshot in place.
    #[instrument(skip(self))]
    pub async fn refresh(&self, id: SnapshotId) -> LedgerResult<ReconciliationSnapshot> {
        let mut tx = self.store.begin().await?;
        let mut snapshot = load_snapshot(tx.as_mut(), id).await?;
        if snapshot.locked {
            return Err(LedgerError::SnapshotLocked(id));
        }
        if snapshot.status != SnapshotStatus::Active {
            return Err(LedgerError::InvalidState(format!(
                "snapshot {id} is not ACTIVE"
            )));
        }

        let month: MonthPeriod = snapshot.period.parse()?;
        let account = cash_account(tx.as_mut(), snapshot.account_id).await?;
        let frozen = freeze(tx.as_mut(), &account, month, id).await?;

        let previous_hash = std::mem::take(&mut snapshot.data_hash);
        snapshot.captured_at = Utc::now();
        snapshot.opening_balance = frozen.opening_balance;
        snapshot.closing_balance = frozen.closing_balance;
        snapshot.total_debit = frozen.total_debit;
        snapshot.total_credit = frozen.total_credit;
        snapshot.transaction_count = count_i64(frozen.rows.len());
        snapshot.data_hash = seal(SealHeader::from(&snapshot), &frozen.rows);

        tx.replace_snapshot_rows(id, &frozen.rows).await?;
        tx.update_snapshot(&snapshot).await?;
        tx.append_audit(&AuditRecord::new(
            AuditEntity::Snapshot,
            id,
            AuditAction::Refreshed,
            json!({ "previous_hash": previous_hash, "hash": snapshot.data_hash }),
        ))
        .await?;
        tx.commit().await?;

        info!(snapshot_id = %id, rows = snapshot.transaction_count, "Snapshot refreshed");
        Ok(snapshot)
    }

    /// Retires an ACTIVE snapshot. Locked rows stay untouched.
    #[instrument(skip(self))]
    pub async fn archive(&self, id: SnapshotId) -> LedgerResult<ReconciliationSnapshot> {
        let mut tx = self.store.begin().await?;
        let mut snapshot = load_snapshot(tx.as_mut(), id).await?;
        if snapshot.status != SnapshotStatus::Active {
            return Err(LedgerError::InvalidState(format!(
                "snapshot {id} is not ACTIVE"
            )));
        }

        snapshot.status = SnapshotStatus::Archived;
        tx.update_snapshot(&snapshot).await?;
        tx.append_audit(&AuditRecord::new(
            AuditEntity::Snapshot,
            id,
            AuditAction::Archived,
            json!({}),
        ))
        .await?;
        tx.commit().await?;

        info!(snapshot_id = %id, "Snapshot archived");
        Ok(snapshot)
    }

    /// Recomputes the seal and compares it with the stored one.
    pub async fn verify(&self, id: SnapshotId) -> LedgerResult<bool> {
        let mut tx = self.store.begin().await?;
        let snapshot = load_snapshot(tx.as_mut(), id).await?;
        let rows = tx.snapshot_rows(id).await?;
        tx.commit().await?;
        Ok(verify(&snapshot, &rows).is_ok())
    }

    /// Diffs two snapshots of the same account.
    ///
    /// Both seals are verified first. A broken seal is recorded as a
    /// NEEDS_REVIEW reconciliation and reported as `IntegrityViolation`.
    #[instrument(skip(self))]
    pub async fn compare(
        &self,
        base_id: SnapshotId,
        current_id: SnapshotId,
        compared_by: &str,
    ) -> LedgerResult<ReconciliationReport> {
        let mut tx = self.store.begin().await?;
        let base = load_snapshot(tx.as_mut(), base_id).await?;
        let current = load_snapshot(tx.as_mut(), current_id).await?;
        if base.account_id != current.account_id {
            return Err(LedgerError::Validation(
                "snapshots belong to different accounts".into(),
            ));
        }
        let base_rows = tx.snapshot_rows(base_id).await?;
        let current_rows = tx.snapshot_rows(current_id).await?;

        let mut reconciliation = Reconciliation {
            id: ReconciliationId::new(),
            account_id: base.account_id,
            base_snapshot_id: base_id,
            comparison_snapshot_id: current_id,
            base_balance: base.closing_balance,
            current_balance: current.closing_balance,
            variance: current.closing_balance - base.closing_balance,
            base_count: count_i64(base_rows.len()),
            current_count: count_i64(current_rows.len()),
            missing_count: 0,
            added_count: 0,
            modified_count: 0,
            status: ReconciliationStatus::Pending,
            is_balanced: false,
            review_notes: None,
            reviewed_by: None,
            reviewed_at: None,
            created_by: compared_by.to_string(),
            created_at: Utc::now(),
        };

        let mut violations = Vec::new();
        for (snapshot, rows) in [(&base, &base_rows), (&current, &current_rows)] {
            if let Err(computed) = verify(snapshot, rows)
                && !violations.iter().any(|(id, _, _)| *id == snapshot.id)
            {
                violations.push((snapshot.id, snapshot.data_hash.clone(), computed));
            }
        }

        if let Some((snapshot_id, stored, computed)) = violations.first().cloned() {
            reconciliation.status = ReconciliationStatus::NeedsReview;
            let differences: Vec<ReconciliationDifference> = violations
                .iter()
                .map(|(id, stored, computed)| ReconciliationDifference {
                    id: DifferenceId::new(),
                    reconciliation_id: reconciliation.id,
                    kind: DifferenceKind::IntegrityViolation,
                    severity: DifferenceKind::IntegrityViolation.severity(),
                    reference: Some(id.to_string()),
                    field: Some("data_hash".to_string()),
                    old_value: Some(stored.clone()),
                    new_value: Some(computed.clone()),
                    amount_difference: Decimal::ZERO,
                    resolution: ResolutionStatus::Pending,
                    resolution_notes: None,
                    resolved_at: None,
                })
                .collect();
            tx.insert_reconciliation(&reconciliation, &differences).await?;
            for (id, stored, computed) in &violations {
                tx.append_audit(&AuditRecord::new(
                    AuditEntity::Snapshot,
                    *id,
                    AuditAction::IntegrityViolation,
                    json!({ "reconciliation_id": reconciliation.id, "stored": stored, "computed": computed }),
                ))
                .await?;
            }
            tx.commit().await?;

            warn!(
                snapshot_id = %snapshot_id,
                reconciliation_id = %reconciliation.id,
                stored = %stored,
                computed = %computed,
                "Snapshot integrity violation"
            );
            return Err(LedgerError::IntegrityViolation {
                snapshot_id,
                stored,
                computed,
            });
        }

        let differences: Vec<ReconciliationDifference> = diff_rows(&base_rows, &current_rows)
            .into_iter()
            .map(|d| to_difference(reconciliation.id, d))
            .collect();
        let count = |pred: fn(DifferenceKind) -> bool| {
            count_i64(differences.iter().filter(|d| pred(d.kind)).count())
        };
        reconciliation.missing_count = count(|k| k == DifferenceKind::Missing);
        reconciliation.added_count = count(|k| k == DifferenceKind::Added);
        reconciliation.modified_count = count(|k| {
            matches!(
                k,
                DifferenceKind::Modified | DifferenceKind::AmountChange | DifferenceKind::DateChange
            )
        });
        reconciliation.is_balanced = reconciliation.variance.is_zero() && differences.is_empty();

        tx.insert_reconciliation(&reconciliation, &differences).await?;
        tx.append_audit(&AuditRecord::new(
            AuditEntity::Reconciliation,
            reconciliation.id,
            AuditAction::Created,
            json!({
                "base": base_id,
                "current": current_id,
                "variance": reconciliation.variance,
                "differences": differences.len(),
            }),
        ))
        .await?;
        tx.commit().await?;

        info!(
            reconciliation_id = %reconciliation.id,
            variance = %reconciliation.variance,
            differences = differences.len(),
            "Snapshots compared"
        );
        Ok(ReconciliationReport {
            reconciliation,
            differences,
        })
    }

    async fn review(
        &self,
        id: ReconciliationId,
        outcome: ReconciliationStatus,
        reviewer: &str,
        notes: Option<String>,
    ) -> LedgerResult<Reconciliation> {
        let mut tx = self.store.begin().await?;
        let mut reconciliation = load_reconciliation(tx.as_mut(), id).await?;
        if !reconciliation.status.is_reviewable() {
            return Err(LedgerError::InvalidState(format!(
                "reconciliation {id} was already reviewed"
            )));
        }

        reconciliation.status = outcome;
        reconciliation.reviewed_by = Some(reviewer.to_string());
        reconciliation.reviewed_at = Some(Utc::now());
        reconciliation.review_notes = notes;
        tx.update_reconciliation(&reconciliation).await?;
        let action = if outcome == ReconciliationStatus::Approved {
            AuditAction::Approved
        } else {
            AuditAction::Rejected
        };
        tx.append_audit(&AuditRecord::new(
            AuditEntity::Reconciliation,
            id,
            action,
            json!({ "reviewer": reviewer, "notes": reconciliation.review_notes }),
        ))
        .await?;
        tx.commit().await?;

        info!(reconciliation_id = %id, reviewer, status = ?outcome, "Reconciliation reviewed");
        Ok(reconciliation)
    }

    /// Accepts a PENDING or NEEDS_REVIEW reconciliation.
    #[instrument(skip(self, notes))]
    pub async fn approve(
        &self,
        id: ReconciliationId,
        reviewer: &str,
        notes: Option<String>,
    ) -> LedgerResult<Reconciliation> {
        self.review(id, ReconciliationStatus::Approved, reviewer, notes)
            .await
    }

    /// Refuses a PENDING or NEEDS_REVIEW reconciliation.
    #[instrument(skip(self, notes))]
    pub async fn reject(
        &self,
        id: ReconciliationId,
        reviewer: &str,
        notes: Option<String>,
    ) -> LedgerResult<Reconciliation> {
        self.review(id, ReconciliationStatus::Rejected, reviewer, notes)
            .await
    }

    /// Records the outcome of looking at one difference.
    #[instrument(skip(self, notes))]
    pub async fn resolve_difference(
        &self,
        id: DifferenceId,
        resolution: ResolutionStatus,
        notes: Option<String>,
    ) -> LedgerResult<ReconciliationDifference> {
        if resolution == ResolutionStatus::Pending {
            return Err(LedgerError::Validation(
                "a difference cannot be resolved back to PENDING".into(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let mut difference = tx
            .difference(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("difference", id))?;
        difference.resolution = resolution;
        difference.resolution_notes = notes;
        difference.resolved_at = Some(Utc::now());
        tx.update_difference(&difference).await?;
        tx.append_audit(&AuditRecord::new(
            AuditEntity::Reconciliation,
            difference.reconciliation_id,
            AuditAction::Resolved,
            json!({ "difference_id": id, "resolution": resolution }),
        ))
        .await?;
        tx.commit().await?;
        Ok(difference)
    }

    /// A stored reconciliation with its differences.
    pub async fn report(&self, id: ReconciliationId) -> LedgerResult<ReconciliationReport> {
        let mut tx = self.store.begin().await?;
        let reconciliation = load_reconciliation(tx.as_mut(), id).await?;
        let differences = tx.differences(id).await?;
        tx.commit().await?;
        Ok(ReconciliationReport {
            reconciliation,
            differences,
        })
    }

    /// Differences of a reconciliation in recorded order.
    pub async fn differences(&self, id: ReconciliationId) -> LedgerResult<Vec<ReconciliationDifference>> {
        Ok(self.report(id).await?.differences)
    }

    /// A snapshot with its frozen rows.
    pub async fn snapshot(
        &self,
        id: SnapshotId,
    ) -> LedgerResult<(ReconciliationSnapshot, Vec<TransactionSnapshot>)> {
        let mut tx = self.store.begin().await?;
        let snapshot = load_snapshot(tx.as_mut(), id).await?;
        let rows = tx.snapshot_rows(id).await?;
        tx.commit().await?;
        Ok((snapshot, rows))
    }

    /// Every snapshot of an account, newest first.
    pub async fn snapshots_for(&self, account_id: AccountId) -> LedgerResult<Vec<ReconciliationSnapshot>> {
        let mut tx = self.store.begin().await?;
        let snapshots = tx.snapshots_for(account_id).await?;
        tx.commit().await?;
        Ok(snapshots)
    }
}
