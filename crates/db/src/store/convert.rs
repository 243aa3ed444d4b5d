//! Row and domain conversions.

use buku_core::LedgerResult;
use buku_core::accounts::Account;
use buku_core::audit::AuditRecord;
use buku_core::closing::AccountingPeriod;
use buku_core::journal::{JournalEntry, JournalLine, SourceDocument};
use buku_core::reconciliation::{
    Reconciliation, ReconciliationDifference, ReconciliationSnapshot, TransactionSnapshot,
};
use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ActiveValue::NotSet, Set};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::entities::{
    accounting_periods, accounts, audit_log, journal_entries, journal_lines,
    reconciliation_differences, reconciliation_snapshots, reconciliations, transaction_snapshots,
};
use crate::error::StoreError;

fn ts(at: DateTime<Utc>) -> DateTimeWithTimeZone {
    at.fixed_offset()
}

fn utc(at: DateTimeWithTimeZone) -> DateTime<Utc> {
    at.to_utc()
}

/// Wire name of a status enum, e.g. `ACTIVE`.
pub(super) fn encode<T: Serialize>(column: &'static str, value: &T) -> LedgerResult<String> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(name)) => Ok(name),
        other => Err(StoreError::UnknownValue {
            column,
            value: format!("{other:?}"),
        }
        .into()),
    }
}

fn decode<T: DeserializeOwned>(column: &'static str, raw: String) -> LedgerResult<T> {
    serde_json::from_value(serde_json::Value::String(raw.clone()))
        .map_err(|_| StoreError::UnknownValue { column, value: raw }.into())
}

// ========== Accounts ==========

pub(super) fn account_row(account: &Account) -> LedgerResult<accounts::ActiveModel> {
    Ok(accounts::ActiveModel {
        id: Set(account.id.into_inner()),
        code: Set(account.code.clone()),
        name: Set(account.name.clone()),
        account_type: Set(encode("account_type", &account.account_type)?),
        category: Set(account.category.clone()),
        parent_id: Set(account.parent_id.map(Into::into)),
        level: Set(account.level),
        is_header: Set(account.is_header),
        is_system_critical: Set(account.is_system_critical),
        status: Set(encode("status", &account.status)?),
        created_at: Set(ts(account.created_at)),
        updated_at: Set(ts(account.updated_at)),
    })
}

pub(super) fn account(row: accounts::Model) -> LedgerResult<Account> {
    Ok(Account {
        id: row.id.into(),
        code: row.code,
        name: row.name,
        account_type: decode("account_type", row.account_type)?,
        category: row.category,
        parent_id: row.parent_id.map(Into::into),
        level: row.level,
        is_header: row.is_header,
        is_system_critical: row.is_system_critical,
        status: decode("status", row.status)?,
        created_at: utc(row.created_at),
        updated_at: utc(row.updated_at),
    })
}

// ========== Journal ==========

pub(super) fn entry_row(entry: &JournalEntry) -> LedgerResult<journal_entries::ActiveModel> {
    Ok(journal_entries::ActiveModel {
        id: Set(entry.id.into_inner()),
        code: Set(entry.code.clone()),
        entry_date: Set(entry.entry_date),
        description: Set(entry.description.clone()),
        status: Set(entry.status.as_str().to_string()),
        total_debit: Set(entry.total_debit),
        total_credit: Set(entry.total_credit),
        source_doc_type: Set(entry.source.as_ref().map(|s| s.doc_type.clone())),
        source_doc_id: Set(entry.source.as_ref().map(|s| s.doc_id.clone())),
        closing_period_id: Set(entry.closing_period_id.map(Into::into)),
        reversal_of: Set(entry.reversal_of.map(Into::into)),
        created_at: Set(ts(entry.created_at)),
        posted_at: Set(entry.posted_at.map(ts)),
        cancelled_at: Set(entry.cancelled_at.map(ts)),
    })
}

pub(super) fn entry(row: journal_entries::Model) -> LedgerResult<JournalEntry> {
    let source = match (row.source_doc_type, row.source_doc_id) {
        (Some(doc_type), Some(doc_id)) => Some(SourceDocument { doc_type, doc_id }),
        _ => None,
    };
    Ok(JournalEntry {
        id: row.id.into(),
        code: row.code,
        entry_date: row.entry_date,
        description: row.description,
        status: decode("status", row.status)?,
        total_debit: row.total_debit,
        total_credit: row.total_credit,
        source,
        closing_period_id: row.closing_period_id.map(Into::into),
        reversal_of: row.reversal_of.map(Into::into),
        created_at: utc(row.created_at),
        posted_at: row.posted_at.map(utc),
        cancelled_at: row.cancelled_at.map(utc),
    })
}

pub(super) fn line_row(line: &JournalLine) -> journal_lines::ActiveModel {
    journal_lines::ActiveModel {
        id: Set(line.id.into_inner()),
        entry_id: Set(line.entry_id.into_inner()),
        account_id: Set(line.account_id.into_inner()),
        debit: Set(line.debit),
        credit: Set(line.credit),
        description: Set(line.description.clone()),
        line_number: Set(line.line_number),
    }
}

pub(super) fn line(row: journal_lines::Model) -> JournalLine {
    JournalLine {
        id: row.id.into(),
        entry_id: row.entry_id.into(),
        account_id: row.account_id.into(),
        debit: row.debit,
        credit: row.credit,
        description: row.description,
        line_number: row.line_number,
    }
}

// ========== Periods ==========

pub(super) fn period_row(period: &AccountingPeriod) -> accounting_periods::ActiveModel {
    accounting_periods::ActiveModel {
        id: Set(period.id.into_inner()),
        start_date: Set(period.start_date),
        end_date: Set(period.end_date),
        status: Set(period.status.as_str().to_string()),
        locked: Set(period.locked),
        locked_at: Set(period.locked_at.map(ts)),
        locked_by: Set(period.locked_by.clone()),
        total_revenue: Set(period.total_revenue),
        total_expense: Set(period.total_expense),
        net_income: Set(period.net_income),
        total_entries: Set(period.total_entries),
        closing_entry_id: Set(period.closing_entry_id.map(Into::into)),
        retained_earnings_id: Set(period.retained_earnings_id.into_inner()),
        closed_at: Set(ts(period.closed_at)),
        reopened_at: Set(period.reopened_at.map(ts)),
        reopen_reason: Set(period.reopen_reason.clone()),
        notes: Set(period.notes.clone()),
    }
}

pub(super) fn period(row: accounting_periods::Model) -> LedgerResult<AccountingPeriod> {
    Ok(AccountingPeriod {
        id: row.id.into(),
        start_date: row.start_date,
        end_date: row.end_date,
        status: decode("status", row.status)?,
        locked: row.locked,
        locked_at: row.locked_at.map(utc),
        locked_by: row.locked_by,
        total_revenue: row.total_revenue,
        total_expense: row.total_expense,
        net_income: row.net_income,
        total_entries: row.total_entries,
        closing_entry_id: row.closing_entry_id.map(Into::into),
        retained_earnings_id: row.retained_earnings_id.into(),
        closed_at: utc(row.closed_at),
        reopened_at: row.reopened_at.map(utc),
        reopen_reason: row.reopen_reason,
        notes: row.notes,
    })
}

// ========== Reconciliation ==========

pub(super) fn snapshot_row(
    snapshot: &ReconciliationSnapshot,
) -> LedgerResult<reconciliation_snapshots::ActiveModel> {
    Ok(reconciliation_snapshots::ActiveModel {
        id: Set(snapshot.id.into_inner()),
        account_id: Set(snapshot.account_id.into_inner()),
        period: Set(snapshot.period.clone()),
        snapshot_date: Set(snapshot.snapshot_date),
        captured_at: Set(ts(snapshot.captured_at)),
        opening_balance: Set(snapshot.opening_balance),
        closing_balance: Set(snapshot.closing_balance),
        total_debit: Set(snapshot.total_debit),
        total_credit: Set(snapshot.total_credit),
        transaction_count: Set(snapshot.transaction_count),
        data_hash: Set(snapshot.data_hash.clone()),
        locked: Set(snapshot.locked),
        locked_at: Set(snapshot.locked_at.map(ts)),
        locked_by: Set(snapshot.locked_by.clone()),
        status: Set(encode("status", &snapshot.status)?),
        notes: Set(snapshot.notes.clone()),
    })
}

pub(super) fn snapshot(row: reconciliation_snapshots::Model) -> LedgerResult<ReconciliationSnapshot> {
    Ok(ReconciliationSnapshot {
        id: row.id.into(),
        account_id: row.account_id.into(),
        period: row.period,
        snapshot_date: row.snapshot_date,
        captured_at: utc(row.captured_at),
        opening_balance: row.opening_balance,
        closing_balance: row.closing_balance,
        total_debit: row.total_debit,
        total_credit: row.total_credit,
        transaction_count: row.transaction_count,
        data_hash: row.data_hash,
        locked: row.locked,
        locked_at: row.locked_at.map(utc),
        locked_by: row.locked_by,
        status: decode("status", row.status)?,
        notes: row.notes,
    })
}

pub(super) fn frozen_row(row: &TransactionSnapshot) -> transaction_snapshots::ActiveModel {
    transaction_snapshots::ActiveModel {
        id: Set(row.id.into_inner()),
        snapshot_id: Set(row.snapshot_id.into_inner()),
        line_number: Set(row.line_number),
        entry_id: Set(row.entry_id.into_inner()),
        entry_date: Set(row.entry_date),
        reference: Set(row.reference.clone()),
        description: Set(row.description.clone()),
        debit: Set(row.debit),
        credit: Set(row.credit),
        running_balance: Set(row.running_balance),
    }
}

pub(super) fn frozen(row: transaction_snapshots::Model) -> TransactionSnapshot {
    TransactionSnapshot {
        id: row.id.into(),
        snapshot_id: row.snapshot_id.into(),
        line_number: row.line_number,
        entry_id: row.entry_id.into(),
        entry_date: row.entry_date,
        reference: row.reference,
        description: row.description,
        debit: row.debit,
        credit: row.credit,
        running_balance: row.running_balance,
    }
}

pub(super) fn reconciliation_row(
    reconciliation: &Reconciliation,
) -> LedgerResult<reconciliations::ActiveModel> {
    Ok(reconciliations::ActiveModel {
        id: Set(reconciliation.id.into_inner()),
        account_id: Set(reconciliation.account_id.into_inner()),
        base_snapshot_id: Set(reconciliation.base_snapshot_id.into_inner()),
        comparison_snapshot_id: Set(reconciliation.comparison_snapshot_id.into_inner()),
        base_balance: Set(reconciliation.base_balance),
        current_balance: Set(reconciliation.current_balance),
        variance: Set(reconciliation.variance),
        base_count: Set(reconciliation.base_count),
        current_count: Set(reconciliation.current_count),
        missing_count: Set(reconciliation.missing_count),
        added_count: Set(reconciliation.added_count),
        modified_count: Set(reconciliation.modified_count),
        status: Set(encode("status", &reconciliation.status)?),
        is_balanced: Set(reconciliation.is_balanced),
        review_notes: Set(reconciliation.review_notes.clone()),
        reviewed_by: Set(reconciliation.reviewed_by.clone()),
        reviewed_at: Set(reconciliation.reviewed_at.map(ts)),
        created_by: Set(reconciliation.created_by.clone()),
        created_at: Set(ts(reconciliation.created_at)),
    })
}

pub(super) fn reconciliation(row: reconciliations::Model) -> LedgerResult<Reconciliation> {
    Ok(Reconciliation {
        id: row.id.into(),
        account_id: row.account_id.into(),
        base_snapshot_id: row.base_snapshot_id.into(),
        comparison_snapshot_id: row.comparison_snapshot_id.into(),
        base_balance: row.base_balance,
        current_balance: row.current_balance,
        variance: row.variance,
        base_count: row.base_count,
        current_count: row.current_count,
        missing_count: row.missing_count,
        added_count: row.added_count,
        modified_count: row.modified_count,
        status: decode("status", row.status)?,
        is_balanced: row.is_balanced,
        review_notes: row.review_notes,
        reviewed_by: row.reviewed_by,
        reviewed_at: row.reviewed_at.map(utc),
        created_by: row.created_by,
        created_at: utc(row.created_at),
    })
}

/// `position` is only set on insert; updates leave the recorded order alone.
pub(super) fn difference_row(
    difference: &ReconciliationDifference,
    position: Option<i32>,
) -> LedgerResult<reconciliation_differences::ActiveModel> {
    Ok(reconciliation_differences::ActiveModel {
        id: Set(difference.id.into_inner()),
        reconciliation_id: Set(difference.reconciliation_id.into_inner()),
        position: position.map_or(NotSet, Set),
        kind: Set(encode("kind", &difference.kind)?),
        severity: Set(encode("severity", &difference.severity)?),
        reference: Set(difference.reference.clone()),
        field: Set(difference.field.clone()),
        old_value: Set(difference.old_value.clone()),
        new_value: Set(difference.new_value.clone()),
        amount_difference: Set(difference.amount_difference),
        resolution: Set(encode("resolution", &difference.resolution)?),
        resolution_notes: Set(difference.resolution_notes.clone()),
        resolved_at: Set(difference.resolved_at.map(ts)),
    })
}

pub(super) fn difference(
    row: reconciliation_differences::Model,
) -> LedgerResult<ReconciliationDifference> {
    Ok(ReconciliationDifference {
        id: row.id.into(),
        reconciliation_id: row.reconciliation_id.into(),
        kind: decode("kind", row.kind)?,
        severity: decode("severity", row.severity)?,
        reference: row.reference,
        field: row.field,
        old_value: row.old_value,
        new_value: row.new_value,
        amount_difference: row.amount_difference,
        resolution: decode("resolution", row.resolution)?,
        resolution_notes: row.resolution_notes,
        resolved_at: row.resolved_at.map(utc),
    })
}

// ========== Audit ==========

pub(super) fn audit_row(record: &AuditRecord) -> LedgerResult<audit_log::ActiveModel> {
    Ok(audit_log::ActiveModel {
        id: Set(record.id.into_inner()),
        entity: Set(encode("entity", &record.entity)?),
        entity_id: Set(record.entity_id),
        action: Set(encode("action", &record.action)?),
        detail: Set(record.detail.clone()),
        recorded_at: Set(ts(record.recorded_at)),
    })
}

pub(super) fn audit(row: audit_log::Model) -> LedgerResult<AuditRecord> {
    Ok(AuditRecord {
        id: row.id.into(),
        entity: decode("entity", row.entity)?,
        entity_id: row.entity_id,
        action: decode("action", row.action)?,
        detail: row.detail,
        recorded_at: utc(row.recorded_at),
    })
}
