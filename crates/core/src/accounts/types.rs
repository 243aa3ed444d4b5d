//! Chart of accounts domain types.

use buku_shared::types::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// The five account classes of double-entry bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Resources owned (cash, receivables).
    Asset,
    /// Obligations owed.
    Liability,
    /// Owner's residual interest.
    Equity,
    /// Income earned. Temporary, zeroed at period close.
    Revenue,
    /// Costs incurred. Temporary, zeroed at period close.
    Expense,
}

impl AccountType {
    /// All account types, in chart order.
    pub const ALL: [Self; 5] = [
        Self::Asset,
        Self::Liability,
        Self::Equity,
        Self::Revenue,
        Self::Expense,
    ];

    /// The side on which this type of account grows.
    ///
    /// This is the only place the type-to-side rule lives.
    #[must_use]
    pub const fn normal_balance(self) -> NormalBalance {
        match self {
            Self::Asset | Self::Expense => NormalBalance::Debit,
            Self::Liability | Self::Equity | Self::Revenue => NormalBalance::Credit,
        }
    }

    /// Returns true for accounts zeroed into retained earnings at close.
    #[must_use]
    pub const fn is_temporary(self) -> bool {
        matches!(self, Self::Revenue | Self::Expense)
    }

    /// Wire name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "ASSET",
            Self::Liability => "LIABILITY",
            Self::Equity => "EQUITY",
            Self::Revenue => "REVENUE",
            Self::Expense => "EXPENSE",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| LedgerError::Validation(format!("unknown account type {s}")))
    }
}

/// Side on which an account's balance is positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NormalBalance {
    /// balance = debit - credit
    Debit,
    /// balance = credit - debit
    Credit,
}

impl NormalBalance {
    /// Applies the sign convention to raw totals.
    #[must_use]
    pub fn signed(self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Self::Debit => debit - credit,
            Self::Credit => credit - debit,
        }
    }
}

/// Lifecycle status of an account. Accounts are never hard-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    /// Usable for postings.
    Active,
    /// Soft-deactivated. History stays, new postings are refused.
    Inactive,
}

/// A chart of accounts entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier.
    pub id: AccountId,
    /// Human code, unique among active accounts (e.g. "1101").
    pub code: String,
    /// Display name.
    pub name: String,
    /// Account class.
    pub account_type: AccountType,
    /// Free-form grouping such as "Current Assets".
    pub category: Option<String>,
    /// Parent header account.
    pub parent_id: Option<AccountId>,
    /// Depth in the tree, roots are level 1.
    pub level: i32,
    /// Header accounts only aggregate children and never receive postings.
    pub is_header: bool,
    /// System-critical accounts cannot be restructured or deactivated.
    pub is_system_critical: bool,
    /// Lifecycle status.
    pub status: AccountStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Returns true if the account is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// The side on which this account grows.
    #[must_use]
    pub const fn normal_balance(&self) -> NormalBalance {
        self.account_type.normal_balance()
    }

    /// Checks that a journal line may reference this account.
    pub fn ensure_postable(&self) -> Result<(), LedgerError> {
        if !self.is_active() {
            return Err(LedgerError::invalid_account(self.id, "account is inactive"));
        }
        if self.is_header {
            return Err(LedgerError::invalid_account(
                self.id,
                "header accounts do not accept postings",
            ));
        }
        Ok(())
    }
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Human code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Account class.
    pub account_type: AccountType,
    /// Parent header account.
    pub parent_id: Option<AccountId>,
    /// Whether the account only aggregates children.
    pub is_header: bool,
    /// Whether the account is protected from structural edits.
    pub is_system_critical: bool,
    /// Free-form grouping.
    pub category: Option<String>,
}

impl NewAccount {
    /// A postable leaf account with no parent.
    pub fn leaf(code: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            account_type,
            parent_id: None,
            is_header: false,
            is_system_critical: false,
            category: None,
        }
    }

    /// A header account with no parent.
    pub fn header(code: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            is_header: true,
            ..Self::leaf(code, name, account_type)
        }
    }

    /// Places the account under a parent.
    #[must_use]
    pub fn under(mut self, parent_id: AccountId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Marks the account system-critical.
    #[must_use]
    pub fn system_critical(mut self) -> Self {
        self.is_system_critical = true;
        self
    }

    /// Sets the category.
    #[must_use]
    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Filter for listing accounts.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    /// Only accounts of this type.
    pub account_type: Option<AccountType>,
    /// Skip inactive accounts.
    pub active_only: bool,
    /// `Some(true)` for headers only, `Some(false)` for postable accounts only.
    pub is_header: Option<bool>,
}

impl AccountFilter {
    /// Returns true if the account passes the filter.
    #[must_use]
    pub fn matches(&self, account: &Account) -> bool {
        self.account_type.is_none_or(|t| t == account.account_type)
            && (!self.active_only || account.is_active())
            && self.is_header.is_none_or(|h| h == account.is_header)
    }
}
