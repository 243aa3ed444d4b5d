//! Chart of accounts.
//!
//! - Account types and the normal-balance rule
//! - Tree rules (parents, depth, cycles)
//! - The chart service: create, resolve, deactivate, move, audit

pub mod hierarchy;
pub mod service;
pub mod types;


pub use hierarchy::{HierarchyIssue, MAX_ACCOUNT_DEPTH};
pub use service::ChartOfAccounts;
pub use types::{Account, AccountFilter, AccountStatus, AccountType, NewAccount, NormalBalance};
