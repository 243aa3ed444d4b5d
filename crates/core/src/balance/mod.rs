//! Derived account balances.
//!
//! Balances are never stored. They are summed from posted lines on demand,
//! with a cache in front of all-time reads.

pub mod aggregate;
pub mod cache;
pub mod service;

#[cfg(test)]
mod aggregate_props;
#[cfg(test)]
mod tests;

pub use aggregate::{
    AccountBalance, AccountTotals, RunningBalance, aggregate_lines, compute_balance, running_balances,
};
pub use cache::BalanceCache;
pub use service::BalanceAggregator;
pub(crate) use service::derive_balance;
