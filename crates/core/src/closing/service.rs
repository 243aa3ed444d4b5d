//! Period closing service.
//!
//! Close, reopen and lock hold the exclusive lock over their date range for
//! the whole transaction, so none of them interleaves with a posting into
//! the same range.

use std::collections::HashMap;
use std::sync::Arc;

use buku_shared::types::{AccountId, PeriodId};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, instrument};

use super::plan::{self, CLOSING_DOC_TYPE};
use super::types::{
    AccountingPeriod, ClosingAccountBalance, ClosingPreview, ClosingTarget, LastClosingInfo,
    PeriodStatus,
};
use crate::accounts::{Account, AccountType};
use crate::audit::{AuditAction, AuditEntity, AuditRecord};
use crate::balance::BalanceCache;
use crate::error::{LedgerError, LedgerResult};
use crate::journal::posting::{self, PostOutcome};
use crate::journal::{EntryMeta, JournalDraft, LineInput, SourceDocument};
use crate::store::{LedgerStore, LedgerTx, LineQuery};

/// Retained earnings code used when none is configured.
pub const DEFAULT_RETAINED_EARNINGS_CODE: &str = "3102";

/// Period closing workflow.
pub struct PeriodClosingService<S: LedgerStore> {
    store: Arc<S>,
    cache: Arc<BalanceCache>,
    retained_earnings_code: String,
}

async fn load_period(tx: &mut dyn LedgerTx, id: PeriodId) -> LedgerResult<AccountingPeriod> {
    tx.period(id)
        .await?
        .ok_or_else(|| LedgerError::not_found("period", id))
}

/// Loads a period, takes the exclusive lock over its range, and reloads it.
async fn lock_period_range(tx: &mut dyn LedgerTx, id: PeriodId) -> LedgerResult<AccountingPeriod> {
    let period = load_period(tx, id).await?;
    tx.lock_range_exclusive(period.start_date, period.end_date)
        .await?;
    load_period(tx, id).await
}

fn check_range(start: NaiveDate, end: NaiveDate) -> LedgerResult<()> {
    if start > end {
        return Err(LedgerError::InvalidDateRange { start, end });
    }
    Ok(())
}

/// Revenue and expense balances dated before `start` that no close zeroed.
async fn prior_unclosed_balances(
    tx: &mut dyn LedgerTx,
    accounts: &HashMap<AccountId, Account>,
    start: NaiveDate,
) -> LedgerResult<Vec<ClosingAccountBalance>> {
    let Some(before) = start.pred_opt() else {
        return Ok(Vec::new());
    };
    // Earlier closing entries are dated inside their own periods.
    let totals = tx.posted_totals(&LineQuery::default().up_to(Some(before))).await?;
    let (mut revenue, expense) = plan::temporary_balances(accounts, &totals);
    revenue.extend(expense);
    Ok(revenue)
}

/// Computes the preview inside an open transaction.
async fn preview_in_tx(tx: &mut dyn LedgerTx, start: NaiveDate, end: NaiveDate) -> LedgerResult<ClosingPreview> {
    check_range(start, end)?;

    let totals = tx.posted_totals(&LineQuery::between(start, end)).await?;
    let total_debit: Decimal = totals.iter().map(|t| t.debit).sum();
    let total_credit: Decimal = totals.iter().map(|t| t.credit).sum();
    if total_debit != total_credit {
        return Err(LedgerError::UnbalancedLedger {
            debit: total_debit,
            credit: total_credit,
        });
    }

    let accounts: HashMap<AccountId, Account> =
        tx.accounts().await?.into_iter().map(|a| (a.id, a)).collect();
    let (revenue_accounts, expense_accounts) = plan::temporary_balances(&accounts, &totals);
    let proposed_lines = plan::closing_lines(&revenue_accounts, &expense_accounts);
    let entry_count = tx.count_posted_entries(start, end).await?;
    let draft_count = tx.count_draft_entries(start, end).await?;
    let unclosed_prior = prior_unclosed_balances(tx, &accounts, start).await?;

    let periods = tx.periods().await?;
    let mut blockers = Vec::new();
    if let Some(existing) = periods.iter().find(|p| !p.is_superseded() && p.overlaps(start, end)) {
        blockers.push(LedgerError::AlreadyClosed {
            start: existing.start_date,
            end: existing.end_date,
        });
    }
    if entry_count == 0 {
        blockers.push(LedgerError::NothingToClose { start, end });
    }
    if draft_count > 0 {
        blockers.push(LedgerError::DraftsInRange {
            start,
            end,
            count: draft_count,
        });
    }
    if !unclosed_prior.is_empty() {
        blockers.push(LedgerError::UnclosedPriorActivity { before: start });
    }

    let can_close = blockers.is_empty();
    let mut validation_messages: Vec<String> = blockers.iter().map(ToString::to_string).collect();
    let expected_start = periods
        .iter()
        .filter(|p| !p.is_superseded())
        .map(|p| p.end_date)
        .max()
        .and_then(|last| last.succ_opt());
    if let Some(expected) = expected_start
        && expected != start
    {
        validation_messages.push(format!(
            "Range starts {start}, the day after the last close is {expected}"
        ));
    }

    let total_revenue = plan::total(&revenue_accounts);
    let total_expense = plan::total(&expense_accounts);
    Ok(ClosingPreview {
        start_date: start,
        end_date: end,
        status: PeriodStatus::PreviewGenerated,
        revenue_accounts,
        expense_accounts,
        total_revenue,
        total_expense,
        net_income: total_revenue - total_expense,
        total_debit,
        total_credit,
        entry_count,
        proposed_lines,
        draft_count,
        unclosed_prior,
        can_close,
        validation_messages,
    })
}

impl<S: LedgerStore> PeriodClosingService<S> {
    /// Creates the service. Closing entries invalidate balances in `cache`.
    #[must_use]
    pub fn new(store: Arc<S>, cache: Arc<BalanceCache>) -> Self {
        Self {
            store,
            cache,
            retained_earnings_code: DEFAULT_RETAINED_EARNINGS_CODE.to_string(),
        }
    }

    /// Sets the code resolved by [`Self::close_default`].
    #[must_use]
    pub fn with_retained_earnings_code(mut self, code: impl Into<String>) -> Self {
        self.retained_earnings_code = code.into();
        self
    }

    fn after_commit(&self, outcome: Option<&PostOutcome>) {
        if let Some(outcome) = outcome {
            self.cache.invalidate(&outcome.touched_accounts());
        }
    }

    /// What closing the range would do. Writes nothing.
    #[instrument(skip(self))]
    pub async fn preview(&self, start: NaiveDate, end: NaiveDate) -> LedgerResult<ClosingPreview> {
        let mut tx = self.store.begin().await?;
        let preview = preview_in_tx(tx.as_mut(), start, end).await?;
        tx.commit().await?;
        Ok(preview)
    }

    /// Closes the range into the configured retained earnings account.
    pub async fn close_default(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        notes: Option<String>,
    ) -> LedgerResult<AccountingPeriod> {
        let mut tx = self.store.begin().await?;
        let retained = tx
            .active_account_by_code(&self.retained_earnings_code)
            .await?
            .ok_or_else(|| LedgerError::not_found("account", &self.retained_earnings_code))?;
        drop(tx);
        self.close(start, end, retained.id, notes).await
    }

    /// Zeroes revenue and expense for the range into retained earnings and
    /// marks the range CLOSED.
    ///
    /// Refused while drafts are dated in the range, or while revenue and
    /// expense posted before `start` still carry a balance.
    ///
    /// When every temporary balance is already zero the period is closed
    /// without an entry.
    #[instrument(skip(self, notes))]
    pub async fn close(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        retained_earnings: AccountId,
        notes: Option<String>,
    ) -> LedgerResult<AccountingPeriod> {
        check_range(start, end)?;

        let mut tx = self.store.begin().await?;
        tx.lock_range_exclusive(start, end).await?;

        if let Some(existing) = tx
            .periods()
            .await?
            .into_iter()
            .find(|p| !p.is_superseded() && p.overlaps(start, end))
        {
            return Err(LedgerError::AlreadyClosed {
                start: existing.start_date,
                end: existing.end_date,
            });
        }

        let entry_count = tx.count_posted_entries(start, end).await?;
        if entry_count == 0 {
            return Err(LedgerError::NothingToClose { start, end });
        }

        let retained = tx
            .account(retained_earnings)
            .await?
            .ok_or_else(|| LedgerError::invalid_account(retained_earnings, "account not found"))?;
        if retained.account_type != AccountType::Equity {
            return Err(LedgerError::invalid_account(
                retained_earnings,
                "retained earnings must be an EQUITY account",
            ));
        }
        retained.ensure_postable()?;

        let preview = preview_in_tx(tx.as_mut(), start, end).await?;
        if preview.draft_count > 0 {
            return Err(LedgerError::DraftsInRange {
                start,
                end,
                count: preview.draft_count,
            });
        }
        if !preview.unclosed_prior.is_empty() {
            return Err(LedgerError::UnclosedPriorActivity { before: start });
        }
        let period_id = PeriodId::new();

        let outcome = if preview.proposed_lines.is_empty() {
            None
        } else {
            let lines = preview
                .proposed_lines
                .iter()
                .map(|line| {
                    let account_id = match line.target {
                        ClosingTarget::Account(id) => id,
                        ClosingTarget::RetainedEarnings => retained.id,
                    };
                    LineInput {
                        account_id,
                        debit: line.debit,
                        credit: line.credit,
                        description: Some(line.description.clone()),
                    }
                })
                .collect();
            let meta = EntryMeta::new(
                plan::closing_code(start, end),
                end,
                format!("Period closing {start} to {end}"),
            )
            .with_source(SourceDocument::new(
                CLOSING_DOC_TYPE,
                plan::closing_reference(start, end),
            ));
            let draft = JournalDraft::new(meta, lines)?.closing(period_id);
            Some(posting::record_and_post(tx.as_mut(), draft).await?)
        };

        let period = AccountingPeriod {
            id: period_id,
            start_date: start,
            end_date: end,
            status: PeriodStatus::Closed,
            locked: false,
            locked_at: None,
            locked_by: None,
            total_revenue: preview.total_revenue,
            total_expense: preview.total_expense,
            net_income: preview.net_income,
            total_entries: i64::try_from(entry_count).unwrap_or(i64::MAX),
            closing_entry_id: outcome.as_ref().map(|o| o.entry.id),
            retained_earnings_id: retained.id,
            closed_at: Utc::now(),
            reopened_at: None,
            reopen_reason: None,
            notes,
        };
        tx.insert_period(&period).await?;
        tx.append_audit(&AuditRecord::new(
            AuditEntity::Period,
            period.id,
            AuditAction::Closed,
            json!({
                "start": start,
                "end": end,
                "net_income": period.net_income,
                "closing_entry_id": period.closing_entry_id,
            }),
        ))
        .await?;
        tx.commit().await?;
        self.after_commit(outcome.as_ref());

        info!(
            period_id = %period.id,
            %start,
            %end,
            net_income = %period.net_income,
            "Period closed"
        );
        Ok(period)
    }

    /// Reverses the closing entry and lets the range accept postings again.
    #[instrument(skip(self))]
    pub async fn reopen(&self, id: PeriodId, reason: &str) -> LedgerResult<AccountingPeriod> {
        let mut tx = self.store.begin().await?;
        let mut period = lock_period_range(tx.as_mut(), id).await?;

        if period.locked {
            return Err(LedgerError::PeriodLocked {
                start: period.start_date,
                end: period.end_date,
            });
        }
        if !period.status.can_transition_to(PeriodStatus::Reopened) {
            return Err(LedgerError::InvalidState(format!(
                "period {id} is {}, only CLOSED periods can be reopened",
                period.status
            )));
        }
        if let Some(newer) = tx
            .periods()
            .await?
            .into_iter()
            .find(|p| p.id != id && !p.is_superseded() && p.start_date > period.end_date)
        {
            return Err(LedgerError::NewerPeriodClosed(newer.id));
        }

        // The period must stop blocking before its closing entry can be reversed.
        period.status = PeriodStatus::Reopened;
        period.reopened_at = Some(Utc::now());
        period.reopen_reason = Some(reason.to_string());
        tx.update_period(&period).await?;

        let outcome = match period.closing_entry_id {
            Some(entry_id) => Some(posting::reverse_entry(tx.as_mut(), entry_id, reason).await?),
            None => None,
        };

        tx.append_audit(&AuditRecord::new(
            AuditEntity::Period,
            id,
            AuditAction::Reopened,
            json!({ "reason": reason, "reversal_id": outcome.as_ref().map(|o| o.entry.id) }),
        ))
        .await?;
        tx.commit().await?;
        self.after_commit(outcome.as_ref());

        info!(period_id = %id, reason, "Period reopened");
        Ok(period)
    }

    /// Hard-locks a closed period. A locked period can never be reopened.
    #[instrument(skip(self))]
    pub async fn lock_period(&self, id: PeriodId, locked_by: &str) -> LedgerResult<AccountingPeriod> {
        let mut tx = self.store.begin().await?;
        let mut period = lock_period_range(tx.as_mut(), id).await?;

        if period.locked {
            return Err(LedgerError::AlreadyLocked(id));
        }
        if period.status != PeriodStatus::Closed {
            return Err(LedgerError::InvalidState(format!(
                "period {id} is {}, only CLOSED periods can be locked",
                period.status
            )));
        }

        period.locked = true;
        period.locked_at = Some(Utc::now());
        period.locked_by = Some(locked_by.to_string());
        tx.update_period(&period).await?;
        tx.append_audit(&AuditRecord::new(
            AuditEntity::Period,
            id,
            AuditAction::Locked,
            json!({ "locked_by": locked_by }),
        ))
        .await?;
        tx.commit().await?;

        info!(period_id = %id, locked_by, "Period locked");
        Ok(period)
    }

    /// The latest closed period and the suggested start of the next close.
    pub async fn last_closing_info(&self) -> LedgerResult<LastClosingInfo> {
        let mut tx = self.store.begin().await?;
        let last_period = tx
            .periods()
            .await?
            .into_iter()
            .filter(|p| !p.is_superseded())
            .max_by_key(|p| p.end_date);
        let next_start_date = match &last_period {
            Some(period) => period.end_date.succ_opt(),
            None => tx.earliest_posted_date().await?,
        };
        tx.commit().await?;
        Ok(LastClosingInfo {
            last_period,
            next_start_date,
        })
    }

    /// Every period ever closed, reopened ones included, newest first.
    pub async fn history(&self) -> LedgerResult<Vec<AccountingPeriod>> {
        let mut periods = self.periods().await?;
        periods.sort_by(|a, b| {
            b.start_date
                .cmp(&a.start_date)
                .then(b.closed_at.cmp(&a.closed_at))
        });
        Ok(periods)
    }

    /// The period governing `date`, if any.
    pub async fn period_for_date(&self, date: NaiveDate) -> LedgerResult<Option<AccountingPeriod>> {
        Ok(self
            .periods()
            .await?
            .into_iter()
            .find(|p| !p.is_superseded() && p.covers(date)))
    }

    /// Returns true if postings dated `date` would be refused.
    pub async fn is_date_in_closed_period(&self, date: NaiveDate) -> LedgerResult<bool> {
        Ok(self
            .periods()
            .await?
            .iter()
            .any(|p| p.covers(date) && p.blocks_posting()))
    }

    async fn periods(&self) -> LedgerResult<Vec<AccountingPeriod>> {
        let mut tx = self.store.begin().await?;
        let periods = tx.periods().await?;
        tx.commit().await?;
        Ok(periods)
    }
}
