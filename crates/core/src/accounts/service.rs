//! Chart of accounts service.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use buku_shared::types::AccountId;
use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument};

use super::hierarchy::{self, HierarchyIssue};
use super::types::{Account, AccountFilter, AccountStatus, NewAccount};
use crate::audit::{AuditAction, AuditEntity, AuditRecord};
use crate::balance::derive_balance;
use crate::error::{LedgerError, LedgerResult};
use crate::store::{LedgerStore, LedgerTx, LineQuery};

/// Chart of accounts.
pub struct ChartOfAccounts<S: LedgerStore> {
    store: Arc<S>,
}

async fn load(tx: &mut dyn LedgerTx, id: AccountId) -> LedgerResult<Account> {
    tx.account(id)
        .await?
        .ok_or_else(|| LedgerError::not_found("account", id))
}

async fn account_map(tx: &mut dyn LedgerTx) -> LedgerResult<HashMap<AccountId, Account>> {
    Ok(tx.accounts().await?.into_iter().map(|a| (a.id, a)).collect())
}

impl<S: LedgerStore> ChartOfAccounts<S> {
    /// Creates the service over a store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Adds an account to the chart.
    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create(&self, input: NewAccount) -> LedgerResult<Account> {
        let code = input.code.trim().to_string();
        let name = input.name.trim().to_string();
        if code.is_empty() {
            return Err(LedgerError::Validation("account code is required".into()));
        }
        if name.is_empty() {
            return Err(LedgerError::Validation("account name is required".into()));
        }

        let mut tx = self.store.begin().await?;
        if tx.active_account_by_code(&code).await?.is_some() {
            return Err(LedgerError::DuplicateCode(code));
        }

        let level = match input.parent_id {
            Some(parent_id) => {
                let accounts = account_map(tx.as_mut()).await?;
                let parent = accounts.get(&parent_id).ok_or_else(|| {
                    LedgerError::InvalidHierarchy(format!("parent {parent_id} does not exist"))
                })?;
                hierarchy::check_parent(&accounts, input.account_type, parent, None)?
            }
            None => 1,
        };

        let now = Utc::now();
        let account = Account {
            id: AccountId::new(),
            code,
            name,
            account_type: input.account_type,
            category: input.category,
            parent_id: input.parent_id,
            level,
            is_header: input.is_header,
            is_system_critical: input.is_system_critical,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        };
        tx.insert_account(&account).await?;
        tx.append_audit(&AuditRecord::new(
            AuditEntity::Account,
            account.id,
            AuditAction::Created,
            json!({ "code": account.code, "type": account.account_type, "parent_id": account.parent_id }),
        ))
        .await?;
        tx.commit().await?;

        info!(account_id = %account.id, code = %account.code, "Account created");
        Ok(account)
    }

    /// Loads an account by id.
    pub async fn get(&self, id: AccountId) -> LedgerResult<Account> {
        let mut tx = self.store.begin().await?;
        let account = load(tx.as_mut(), id).await?;
        tx.commit().await?;
        Ok(account)
    }

    /// The active account with the given code.
    pub async fn resolve(&self, code: &str) -> LedgerResult<Account> {
        let mut tx = self.store.begin().await?;
        let account = tx
            .active_account_by_code(code)
            .await?
            .ok_or_else(|| LedgerError::not_found("account", code))?;
        tx.commit().await?;
        Ok(account)
    }

    /// Accounts passing the filter, ordered by code.
    pub async fn list(&self, filter: &AccountFilter) -> LedgerResult<Vec<Account>> {
        let mut tx = self.store.begin().await?;
        let accounts = tx.accounts().await?;
        tx.commit().await?;
        Ok(accounts.into_iter().filter(|a| filter.matches(a)).collect())
    }

    /// Direct children of an account, ordered by code.
    pub async fn children(&self, id: AccountId) -> LedgerResult<Vec<Account>> {
        let mut tx = self.store.begin().await?;
        load(tx.as_mut(), id).await?;
        let accounts = tx.accounts().await?;
        tx.commit().await?;
        Ok(accounts
            .into_iter()
            .filter(|a| a.parent_id == Some(id))
            .collect())
    }

    /// Soft-deactivates an account.
    ///
    /// Refused for system-critical accounts, accounts with active children,
    /// and accounts whose derived balance is not zero.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: AccountId) -> LedgerResult<Account> {
        let mut tx = self.store.begin().await?;
        let mut account = load(tx.as_mut(), id).await?;
        if account.is_system_critical {
            return Err(LedgerError::SystemCritical(id));
        }
        if !account.is_active() {
            return Err(LedgerError::InvalidState(format!(
                "account {} is already inactive",
                account.code
            )));
        }
        if tx
            .accounts()
            .await?
            .iter()
            .any(|a| a.parent_id == Some(id) && a.is_active())
        {
            return Err(LedgerError::HasActiveChildren(id));
        }
        let balance = derive_balance(tx.as_mut(), &account, None).await?;
        if !balance.balance.is_zero() {
            return Err(LedgerError::HasBalance {
                account_id: id,
                balance: balance.balance,
            });
        }

        account.status = AccountStatus::Inactive;
        account.updated_at = Utc::now();
        tx.update_account(&account).await?;
        tx.append_audit(&AuditRecord::new(
            AuditEntity::Account,
            id,
            AuditAction::Deactivated,
            json!({ "code": account.code }),
        ))
        .await?;
        tx.commit().await?;

        info!(account_id = %id, code = %account.code, "Account deactivated");
        Ok(account)
    }

    /// Re-parents an account, or makes it a root with `None`.
    ///
    /// Levels of the whole subtree are recomputed.
    #[instrument(skip(self))]
    pub async fn move_account(&self, id: AccountId, new_parent: Option<AccountId>) -> LedgerResult<Account> {
        let mut tx = self.store.begin().await?;
        let mut accounts = account_map(tx.as_mut()).await?;
        let account = accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("account", id))?;
        if account.is_system_critical {
            return Err(LedgerError::SystemCritical(id));
        }

        let level = match new_parent {
            Some(parent_id) => {
                let parent = accounts.get(&parent_id).ok_or_else(|| {
                    LedgerError::InvalidHierarchy(format!("parent {parent_id} does not exist"))
                })?;
                hierarchy::check_parent(&accounts, account.account_type, parent, Some(id))?
            }
            None => 1,
        };

        let shift = level - account.level;
        let subtree = hierarchy::descendants(&accounts, id);
        let now = Utc::now();

        if let Some(moved) = accounts.get_mut(&id) {
            moved.parent_id = new_parent;
            moved.level = level;
            moved.updated_at = now;
        }
        for descendant in &subtree {
            if let Some(child) = accounts.get_mut(descendant) {
                child.level += shift;
                child.updated_at = now;
            }
        }
        for changed in std::iter::once(&id).chain(subtree.iter()) {
            if let Some(record) = accounts.get(changed) {
                tx.update_account(record).await?;
            }
        }
        tx.append_audit(&AuditRecord::new(
            AuditEntity::Account,
            id,
            AuditAction::Moved,
            json!({ "from": account.parent_id, "to": new_parent }),
        ))
        .await?;
        tx.commit().await?;

        info!(account_id = %id, subtree = subtree.len(), "Account moved");
        accounts
            .remove(&id)
            .ok_or_else(|| LedgerError::not_found("account", id))
    }

    /// Walks the chart and reports every structural problem.
    pub async fn validate_hierarchy(&self) -> LedgerResult<Vec<HierarchyIssue>> {
        let mut tx = self.store.begin().await?;
        let accounts = account_map(tx.as_mut()).await?;
        let posted: HashSet<AccountId> = tx
            .posted_totals(&LineQuery::default())
            .await?
            .into_iter()
            .map(|t| t.account_id)
            .collect();
        tx.commit().await?;
        Ok(hierarchy::audit(&accounts, |id| posted.contains(&id)))
    }
}
