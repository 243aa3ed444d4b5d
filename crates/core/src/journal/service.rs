//! Journal service: the only way entries reach the ledger.

use std::sync::Arc;

use buku_shared::types::JournalEntryId;
use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument};

use super::draft::JournalDraft;
use super::posting::{self, PostOutcome};
use super::types::{EntryStatus, JournalEntry, JournalEntryWithLines, PostedEntryFilter};
use crate::audit::{AuditAction, AuditEntity, AuditRecord};
use crate::balance::BalanceCache;
use crate::error::{LedgerError, LedgerResult};
use crate::store::{LedgerStore, LineQuery};

/// Journal entry lifecycle.
pub struct JournalService<S: LedgerStore> {
    store: Arc<S>,
    cache: Arc<BalanceCache>,
}

impl<S: LedgerStore> JournalService<S> {
    /// Creates the service. Posts invalidate balances in `cache`.
    #[must_use]
    pub fn new(store: Arc<S>, cache: Arc<BalanceCache>) -> Self {
        Self { store, cache }
    }

    fn after_commit(&self, outcome: &PostOutcome) {
        self.cache.invalidate(&outcome.touched_accounts());
    }

    /// Stores a draft. Nothing counts toward balances until it is posted.
    #[instrument(skip(self, draft), fields(code = %draft.meta().code))]
    pub async fn submit_draft(&self, draft: JournalDraft) -> LedgerResult<JournalEntry> {
        let mut tx = self.store.begin().await?;
        let entry = posting::record_draft(tx.as_mut(), draft).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Validates and posts a stored draft.
    #[instrument(skip(self))]
    pub async fn post(&self, id: JournalEntryId) -> LedgerResult<JournalEntry> {
        let mut tx = self.store.begin().await?;
        let outcome = posting::post_entry(tx.as_mut(), id).await?;
        tx.commit().await?;
        self.after_commit(&outcome);

        info!(entry_id = %id, code = %outcome.entry.code, "Journal entry posted");
        Ok(outcome.entry)
    }

    /// Stores and posts a draft in one transaction.
    #[instrument(skip(self, draft), fields(code = %draft.meta().code))]
    pub async fn post_draft(&self, draft: JournalDraft) -> LedgerResult<JournalEntry> {
        let mut tx = self.store.begin().await?;
        let outcome = posting::record_and_post(tx.as_mut(), draft).await?;
        tx.commit().await?;
        self.after_commit(&outcome);

        info!(entry_id = %outcome.entry.id, code = %outcome.entry.code, "Journal entry posted");
        Ok(outcome.entry)
    }

    /// Cancels a posted entry by posting its mirror. Returns the reversal.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: JournalEntryId, reason: &str) -> LedgerResult<JournalEntry> {
        let mut tx = self.store.begin().await?;
        let outcome = posting::reverse_entry(tx.as_mut(), id, reason).await?;
        tx.commit().await?;
        self.after_commit(&outcome);

        info!(entry_id = %id, reversal_id = %outcome.entry.id, "Journal entry reversed");
        Ok(outcome.entry)
    }

    /// Turns a draft into a CANCELLED tombstone and drops its lines.
    #[instrument(skip(self))]
    pub async fn discard_draft(&self, id: JournalEntryId) -> LedgerResult<JournalEntry> {
        let mut tx = self.store.begin().await?;
        let mut entry = posting::load_entry(tx.as_mut(), id).await?;
        if entry.status != EntryStatus::Draft {
            return Err(LedgerError::InvalidState(format!(
                "entry {} is {}, only DRAFT entries can be discarded",
                entry.code, entry.status
            )));
        }

        entry.status = EntryStatus::Cancelled;
        entry.cancelled_at = Some(Utc::now());
        tx.delete_lines(id).await?;
        tx.update_entry(&entry).await?;
        tx.append_audit(&AuditRecord::new(
            AuditEntity::JournalEntry,
            id,
            AuditAction::Discarded,
            json!({ "code": entry.code }),
        ))
        .await?;
        tx.commit().await?;

        info!(entry_id = %id, "Draft discarded");
        Ok(entry)
    }

    /// Loads an entry with its lines.
    pub async fn get(&self, id: JournalEntryId) -> LedgerResult<JournalEntryWithLines> {
        let mut tx = self.store.begin().await?;
        let entry = posting::load_entry(tx.as_mut(), id).await?;
        let lines = tx.lines(id).await?;
        tx.commit().await?;
        Ok(JournalEntryWithLines { entry, lines })
    }

    /// The entry reversing `id`, if one was posted.
    pub async fn reversal_of(&self, id: JournalEntryId) -> LedgerResult<Option<JournalEntry>> {
        let mut tx = self.store.begin().await?;
        let reversal = tx.reversal_of(id).await?;
        tx.commit().await?;
        Ok(reversal)
    }

    /// Posted entries with all their lines, in posting order.
    pub async fn posted_entries(&self, filter: &PostedEntryFilter) -> LedgerResult<Vec<JournalEntryWithLines>> {
        let query = LineQuery {
            accounts: filter.account_id.map(|id| vec![id]),
            from: filter.from,
            to: filter.to,
        };

        let mut tx = self.store.begin().await?;
        let mut entry_ids: Vec<JournalEntryId> = Vec::new();
        for posted in tx.posted_lines(&query).await? {
            if !entry_ids.contains(&posted.entry_id) {
                entry_ids.push(posted.entry_id);
            }
        }

        let mut out = Vec::with_capacity(entry_ids.len());
        for id in entry_ids {
            let entry = posting::load_entry(tx.as_mut(), id).await?;
            let lines = tx.lines(id).await?;
            out.push(JournalEntryWithLines { entry, lines });
        }
        tx.commit().await?;
        Ok(out)
    }
}
