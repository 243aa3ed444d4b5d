//! Ledger facade wiring every service over one store and one balance cache.

use std::sync::Arc;
use std::time::Duration;

use buku_shared::LedgerConfig;
use tokio::task::JoinHandle;

use crate::accounts::ChartOfAccounts;
use crate::balance::{BalanceAggregator, BalanceCache};
use crate::closing::PeriodClosingService;
use crate::journal::JournalService;
use crate::reconciliation::ReconciliationService;
use crate::store::LedgerStore;

/// The ledger core.
pub struct Ledger<S: LedgerStore> {
    store: Arc<S>,
    accounts: ChartOfAccounts<S>,
    journal: JournalService<S>,
    balances: Arc<BalanceAggregator<S>>,
    closing: PeriodClosingService<S>,
    reconciliation: ReconciliationService<S>,
    refresh_interval: Option<Duration>,
}

impl<S: LedgerStore> Ledger<S> {
    /// Builds the ledger with default cache settings.
    pub fn new(store: S) -> Self {
        Self::with_cache(Arc::new(store), Arc::new(BalanceCache::new()))
    }

    /// Builds the ledger from loaded configuration.
    pub fn from_config(store: S, config: &LedgerConfig) -> Self {
        let cache = Arc::new(BalanceCache::from_config(&config.balance_cache));
        let mut ledger = Self::with_cache(Arc::new(store), cache);
        ledger.closing = ledger
            .closing
            .with_retained_earnings_code(config.closing.retained_earnings_code.clone());
        ledger.refresh_interval = match config.balance_cache.refresh_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        ledger
    }

    /// Builds the ledger over a shared store and cache.
    pub fn with_cache(store: Arc<S>, cache: Arc<BalanceCache>) -> Self {
        Self {
            accounts: ChartOfAccounts::new(Arc::clone(&store)),
            journal: JournalService::new(Arc::clone(&store), Arc::clone(&cache)),
            balances: Arc::new(BalanceAggregator::new(Arc::clone(&store), Arc::clone(&cache))),
            closing: PeriodClosingService::new(Arc::clone(&store), cache),
            reconciliation: ReconciliationService::new(Arc::clone(&store)),
            store,
            refresh_interval: None,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Chart of accounts.
    pub fn accounts(&self) -> &ChartOfAccounts<S> {
        &self.accounts
    }

    /// Journal entries.
    pub fn journal(&self) -> &JournalService<S> {
        &self.journal
    }

    /// Derived balances.
    pub fn balances(&self) -> &BalanceAggregator<S> {
        &self.balances
    }

    /// Period closing.
    pub fn closing(&self) -> &PeriodClosingService<S> {
        &self.closing
    }

    /// Cash and bank reconciliation.
    pub fn reconciliation(&self) -> &ReconciliationService<S> {
        &self.reconciliation
    }

    /// Starts the background balance refresh when an interval is configured.
    pub fn spawn_refresh_job(&self) -> Option<JoinHandle<()>> {
        self.refresh_interval
            .map(|interval| Arc::clone(&self.balances).spawn_refresh_job(interval))
    }
}
