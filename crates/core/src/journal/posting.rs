//! Posting inside an open transaction.
//!
//! The journal service, the closing service and period reopen all post
//! through these helpers, so every posted entry passes the same validator
//! under the same period lock. Callers commit, then invalidate the balances
//! of [`PostOutcome::touched_accounts`].

use std::collections::{BTreeSet, HashMap};

use buku_shared::types::{AccountId, JournalEntryId};
use chrono::Utc;
use serde_json::json;
use tracing::warn;

use super::draft::JournalDraft;
use super::reversal::ReversalBuilder;
use super::types::{EntryStatus, JournalEntry, JournalLine};
use super::validator::PostingValidator;
use crate::audit::{AuditAction, AuditEntity, AuditRecord};
use crate::error::{LedgerError, LedgerResult};
use crate::store::LedgerTx;

/// A freshly posted entry.
#[derive(Debug, Clone)]
pub(crate) struct PostOutcome {
    pub entry: JournalEntry,
    pub lines: Vec<JournalLine>,
}

impl PostOutcome {
    /// Distinct accounts the entry moved.
    pub fn touched_accounts(&self) -> Vec<AccountId> {
        self.lines
            .iter()
            .map(|l| l.account_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

pub(crate) async fn load_entry(tx: &mut dyn LedgerTx, id: JournalEntryId) -> LedgerResult<JournalEntry> {
    tx.entry(id)
        .await?
        .ok_or_else(|| LedgerError::not_found("journal entry", id))
}

/// Stores a draft and its lines as DRAFT.
pub(crate) async fn record_draft(tx: &mut dyn LedgerTx, draft: JournalDraft) -> LedgerResult<JournalEntry> {
    let (entry, lines) = draft.into_records(Utc::now());
    tx.insert_entry(&entry, &lines).await?;
    tx.append_audit(&AuditRecord::new(
        AuditEntity::JournalEntry,
        entry.id,
        AuditAction::Created,
        json!({ "code": entry.code, "lines": lines.len() }),
    ))
    .await?;
    Ok(entry)
}

/// Validates and posts a stored draft.
///
/// Order: shared lock on the entry date, DRAFT check, balance, accounts,
/// period. Nothing is written unless every check passes.
pub(crate) async fn post_entry(tx: &mut dyn LedgerTx, id: JournalEntryId) -> LedgerResult<PostOutcome> {
    let date = load_entry(tx, id).await?.entry_date;
    tx.lock_date_shared(date).await?;
    let mut entry = load_entry(tx, id).await?;

    if entry.status != EntryStatus::Draft {
        return Err(LedgerError::InvalidState(format!(
            "entry {} is {}, only DRAFT entries can be posted",
            entry.code, entry.status
        )));
    }

    let lines = tx.lines(id).await?;
    let mut accounts = HashMap::new();
    for account_id in lines.iter().map(|l| l.account_id).collect::<BTreeSet<_>>() {
        if let Some(account) = tx.account(account_id).await? {
            accounts.insert(account_id, account);
        }
    }
    let periods = tx.periods().await?;

    let totals = PostingValidator::validate(
        entry.entry_date,
        &lines,
        |account_id| accounts.get(&account_id).cloned(),
        &periods,
    )
    .inspect_err(|e| warn!(entry_id = %id, code = %entry.code, error = %e, "Posting rejected"))?;

    entry.status = EntryStatus::Posted;
    entry.total_debit = totals.debit;
    entry.total_credit = totals.credit;
    entry.posted_at = Some(Utc::now());
    tx.update_entry(&entry).await?;
    tx.append_audit(&AuditRecord::new(
        AuditEntity::JournalEntry,
        entry.id,
        AuditAction::Posted,
        json!({ "code": entry.code, "total": totals.debit }),
    ))
    .await?;

    Ok(PostOutcome { entry, lines })
}

/// Stores a draft and posts it in the same transaction.
pub(crate) async fn record_and_post(tx: &mut dyn LedgerTx, draft: JournalDraft) -> LedgerResult<PostOutcome> {
    let entry = record_draft(tx, draft).await?;
    post_entry(tx, entry.id).await
}

/// Posts the mirror of a posted entry. The original is left untouched.
pub(crate) async fn reverse_entry(
    tx: &mut dyn LedgerTx,
    id: JournalEntryId,
    reason: &str,
) -> LedgerResult<PostOutcome> {
    let date = load_entry(tx, id).await?.entry_date;
    tx.lock_date_shared(date).await?;
    let original = load_entry(tx, id).await?;

    if original.status != EntryStatus::Posted {
        return Err(LedgerError::InvalidState(format!(
            "entry {} is {}, only POSTED entries can be cancelled",
            original.code, original.status
        )));
    }
    if tx.reversal_of(id).await?.is_some() {
        return Err(LedgerError::AlreadyReversed(id));
    }

    let lines = tx.lines(id).await?;
    let draft = ReversalBuilder::build(&original, &lines, reason)?;
    let outcome = record_and_post(tx, draft).await?;

    tx.append_audit(&AuditRecord::new(
        AuditEntity::JournalEntry,
        original.id,
        AuditAction::Reversed,
        json!({ "reversal_id": outcome.entry.id, "reason": reason }),
    ))
    .await?;

    Ok(outcome)
}
