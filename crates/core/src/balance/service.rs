//! Balance aggregator service.
//!
//! Reads balances from posted lines, with a Moka cache in front of unbounded
//! reads. Postings only invalidate; a fresh recompute is the only thing that
//! ever fills the cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use buku_shared::types::AccountId;
use chrono::NaiveDate;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::aggregate::{AccountBalance, compute_balance};
use super::cache::BalanceCache;
use crate::accounts::Account;
use crate::error::{LedgerError, LedgerResult};
use crate::store::{LedgerStore, LedgerTx, LineQuery};

/// Derives an account balance inside an open transaction.
///
/// `as_of` bounds the lines by entry date, inclusive.
pub(crate) async fn derive_balance(
    tx: &mut dyn LedgerTx,
    account: &Account,
    as_of: Option<NaiveDate>,
) -> LedgerResult<AccountBalance> {
    let totals = tx
        .posted_totals(&LineQuery::account(account.id).up_to(as_of))
        .await?;
    Ok(totals.first().map_or_else(
        || AccountBalance::zero(account.id),
        |t| compute_balance(account.id, account.normal_balance(), t.debit, t.credit),
    ))
}

/// Account balance reads.
pub struct BalanceAggregator<S: LedgerStore> {
    store: Arc<S>,
    cache: Arc<BalanceCache>,
}

impl<S: LedgerStore> BalanceAggregator<S> {
    /// Creates an aggregator over a store and a shared cache.
    #[must_use]
    pub fn new(store: Arc<S>, cache: Arc<BalanceCache>) -> Self {
        Self { store, cache }
    }

    /// The cache shared with the posting paths.
    #[must_use]
    pub fn cache(&self) -> &Arc<BalanceCache> {
        &self.cache
    }

    /// Balance of one account, optionally as of a date.
    ///
    /// Unbounded reads are served from the cache when fresh; dated reads
    /// always recompute.
    #[instrument(skip(self))]
    pub async fn balance_of(
        &self,
        account_id: AccountId,
        as_of: Option<NaiveDate>,
    ) -> LedgerResult<AccountBalance> {
        if as_of.is_none()
            && let Some(cached) = self.cache.get(account_id)
        {
            return Ok(cached);
        }

        let generation = self.cache.generation(account_id);
        let mut tx = self.store.begin().await?;
        let account = tx
            .account(account_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("account", account_id))?;
        let balance = derive_balance(tx.as_mut(), &account, as_of).await?;
        tx.commit().await?;

        if as_of.is_none() {
            self.cache.fill(balance, generation);
        }
        Ok(balance)
    }

    /// Balances of several accounts read from one snapshot, in input order.
    #[instrument(skip(self))]
    pub async fn balances_for(&self, account_ids: &[AccountId]) -> LedgerResult<Vec<AccountBalance>> {
        let generations: Vec<u64> = account_ids
            .iter()
            .map(|id| self.cache.generation(*id))
            .collect();

        let mut tx = self.store.begin().await?;
        let mut accounts = Vec::with_capacity(account_ids.len());
        for id in account_ids {
            let account = tx
                .account(*id)
                .await?
                .ok_or_else(|| LedgerError::not_found("account", id))?;
            accounts.push(account);
        }
        let totals: HashMap<AccountId, _> = tx
            .posted_totals(&LineQuery::accounts(account_ids))
            .await?
            .into_iter()
            .map(|t| (t.account_id, t))
            .collect();
        tx.commit().await?;

        let balances: Vec<AccountBalance> = accounts
            .iter()
            .map(|account| {
                totals.get(&account.id).map_or_else(
                    || AccountBalance::zero(account.id),
                    |t| compute_balance(account.id, account.normal_balance(), t.debit, t.credit),
                )
            })
            .collect();

        for (balance, generation) in balances.iter().zip(generations) {
            self.cache.fill(*balance, generation);
        }
        Ok(balances)
    }

    /// Marks cached balances stale. Never recomputes.
    pub fn invalidate(&self, account_ids: &[AccountId]) {
        debug!(accounts = account_ids.len(), "Invalidating cached balances");
        self.cache.invalidate(account_ids);
    }

    /// Recomputes one balance and refills the cache.
    #[instrument(skip(self))]
    pub async fn refresh(&self, account_id: AccountId) -> LedgerResult<AccountBalance> {
        let generation = self.cache.generation(account_id);
        let mut tx = self.store.begin().await?;
        let account = tx
            .account(account_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("account", account_id))?;
        let balance = derive_balance(tx.as_mut(), &account, None).await?;
        tx.commit().await?;

        self.cache.fill(balance, generation);
        Ok(balance)
    }

    /// Recomputes every active account from one snapshot. Returns how many
    /// balances were written to the cache.
    #[instrument(skip(self))]
    pub async fn refresh_all(&self) -> LedgerResult<usize> {
        let mut tx = self.store.begin().await?;
        let accounts: Vec<Account> = tx
            .accounts()
            .await?
            .into_iter()
            .filter(Account::is_active)
            .collect();
        let generations: Vec<u64> = accounts
            .iter()
            .map(|a| self.cache.generation(a.id))
            .collect();
        let totals: HashMap<AccountId, _> = tx
            .posted_totals(&LineQuery::default())
            .await?
            .into_iter()
            .map(|t| (t.account_id, t))
            .collect();
        tx.commit().await?;

        let mut filled = 0;
        for (account, generation) in accounts.iter().zip(generations) {
            let balance = totals.get(&account.id).map_or_else(
                || AccountBalance::zero(account.id),
                |t| compute_balance(account.id, account.normal_balance(), t.debit, t.credit),
            );
            if self.cache.fill(balance, generation) {
                filled += 1;
            }
        }
        info!(accounts = accounts.len(), filled, "Balance cache refreshed");
        Ok(filled)
    }

    /// The cached balance, if any.
    #[must_use]
    pub fn cached(&self, account_id: AccountId) -> Option<AccountBalance> {
        self.cache.get(account_id)
    }

    /// Runs `refresh_all` every `interval` until the handle is aborted.
    pub fn spawn_refresh_job(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.refresh_all().await {
                    warn!(error = %e, "Balance refresh failed");
                }
            }
        })
    }
}
