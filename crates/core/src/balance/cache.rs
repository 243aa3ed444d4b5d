//! Derived balance cache using Moka.
//!
//! The cache is an optimization, never a source of truth. Postings invalidate
//! entries and never write them; only a fresh recompute fills the cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use buku_shared::config::BalanceCacheConfig;
use buku_shared::types::AccountId;
use dashmap::DashMap;
use moka::sync::Cache;

use super::aggregate::AccountBalance;

/// Default cache capacity (number of accounts).
const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// Default time-to-live for cache entries (5 minutes).
const DEFAULT_TTL_SECS: u64 = 300;

/// Cache of unbounded (all-time) account balances.
///
/// Each account carries a generation counter bumped on every invalidation. A
/// recompute remembers the generation it started at, and its result is dropped
/// if an invalidation happened in between.
pub struct BalanceCache {
    cache: Cache<AccountId, AccountBalance>,
    generations: DashMap<AccountId, u64>,
    epoch: AtomicU64,
}

impl BalanceCache {
    /// Creates a cache with default settings.
    ///
    /// Default: 10,000 accounts max, 5 minute TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_CACHE_CAPACITY, DEFAULT_TTL_SECS)
    }

    /// Creates a cache with custom capacity and TTL.
    #[must_use]
    pub fn with_config(max_capacity: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            cache,
            generations: DashMap::new(),
            epoch: AtomicU64::new(0),
        }
    }

    /// Creates a cache from loaded configuration.
    #[must_use]
    pub fn from_config(config: &BalanceCacheConfig) -> Self {
        Self::with_config(config.capacity, config.ttl_secs)
    }

    /// Returns the cached balance, if fresh.
    #[must_use]
    pub fn get(&self, account_id: AccountId) -> Option<AccountBalance> {
        self.cache.get(&account_id)
    }

    /// Current generation of an account. Take it before starting a recompute.
    #[must_use]
    pub fn generation(&self, account_id: AccountId) -> u64 {
        let own = self.generations.get(&account_id).map_or(0, |g| *g);
        self.epoch.load(Ordering::SeqCst) + own
    }

    /// Stores a recomputed balance unless the account was invalidated since
    /// `generation` was read. Returns true if the value was kept.
    pub fn fill(&self, balance: AccountBalance, generation: u64) -> bool {
        let account_id = balance.account_id;
        if self.generation(account_id) != generation {
            return false;
        }
        self.cache.insert(account_id, balance);
        // An invalidation may have slipped in between the check and the insert.
        if self.generation(account_id) != generation {
            self.cache.invalidate(&account_id);
            return false;
        }
        true
    }

    /// Marks the given accounts stale.
    pub fn invalidate(&self, account_ids: &[AccountId]) {
        for account_id in account_ids {
            *self.generations.entry(*account_id).or_insert(0) += 1;
            self.cache.invalidate(account_id);
        }
    }

    /// Marks every account stale.
    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate_all();
    }

    /// Returns the number of entries currently in the cache.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs pending maintenance so `entry_count` is up to date.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

impl Default for BalanceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balance(account_id: AccountId, amount: rust_decimal::Decimal) -> AccountBalance {
        AccountBalance {
            account_id,
            debit: amount,
            credit: dec!(0),
            balance: amount,
        }
    }

    #[test]
    fn test_fill_and_get() {
        let cache = BalanceCache::new();
        let account = AccountId::new();
        let generation = cache.generation(account);

        assert!(cache.fill(balance(account, dec!(10)), generation));
        assert_eq!(cache.get(account).unwrap().balance, dec!(10));
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let cache = BalanceCache::new();
        let account = AccountId::new();
        cache.fill(balance(account, dec!(10)), 0);

        cache.invalidate(&[account]);
        assert!(cache.get(account).is_none());
        assert_eq!(cache.generation(account), 1);
    }

    #[test]
    fn test_stale_recompute_is_discarded() {
        let cache = BalanceCache::new();
        let account = AccountId::new();
        let started_at = cache.generation(account);

        // A posting lands while the recompute is running.
        cache.invalidate(&[account]);

        assert!(!cache.fill(balance(account, dec!(10)), started_at));
        assert!(cache.get(account).is_none());
    }

    #[test]
    fn test_invalidate_all_bumps_every_generation() {
        let cache = BalanceCache::new();
        let a = AccountId::new();
        let b = AccountId::new();
        cache.invalidate(&[a]);
        cache.fill(balance(b, dec!(1)), 0);
        cache.fill(balance(a, dec!(1)), 1);

        cache.invalidate_all();

        assert!(cache.get(a).is_none());
        assert!(cache.get(b).is_none());
        assert_eq!(cache.generation(a), 2);
        assert_eq!(cache.generation(b), 1);
        assert!(!cache.fill(balance(b, dec!(1)), 0));
    }
}
