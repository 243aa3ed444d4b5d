//! Account tree rules.
//!
//! Pure checks over an in-memory view of the chart. The service loads the
//! accounts inside its transaction and hands them here.

use std::collections::{HashMap, HashSet};

use buku_shared::types::AccountId;
use serde::{Deserialize, Serialize};

use super::types::{Account, AccountType};
use crate::error::{LedgerError, LedgerResult};

/// Deepest level an account may sit at.
pub const MAX_ACCOUNT_DEPTH: i32 = 5;

/// A structural problem found by [`audit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HierarchyIssue {
    /// Parent reference points at nothing.
    Orphan {
        /// The account.
        account_id: AccountId,
        /// The missing parent.
        parent_id: AccountId,
    },
    /// Following parents leads back to the account.
    Circular {
        /// The account.
        account_id: AccountId,
    },
    /// Child and parent are of different types.
    TypeMismatch {
        /// The account.
        account_id: AccountId,
        /// Its type.
        account_type: AccountType,
        /// The parent's type.
        parent_type: AccountType,
    },
    /// The account's parent is not a header.
    NonHeaderParent {
        /// The account.
        account_id: AccountId,
        /// The parent.
        parent_id: AccountId,
    },
    /// The account sits deeper than allowed.
    TooDeep {
        /// The account.
        account_id: AccountId,
        /// Its depth.
        depth: i32,
    },
    /// The stored level disagrees with the tree.
    LevelMismatch {
        /// The account.
        account_id: AccountId,
        /// Level recorded on the account.
        stored: i32,
        /// Level implied by its ancestors.
        actual: i32,
    },
    /// A header account carries postings.
    HeaderWithPostings {
        /// The account.
        account_id: AccountId,
    },
}

/// Checks that `account_type` may hang under `parent` and returns the child level.
///
/// `moving` is the account being re-parented, if any; its own subtree must not
/// contain `parent`.
pub fn check_parent(
    accounts: &HashMap<AccountId, Account>,
    account_type: AccountType,
    parent: &Account,
    moving: Option<AccountId>,
) -> LedgerResult<i32> {
    if !parent.is_header {
        return Err(LedgerError::InvalidHierarchy(format!(
            "parent {} is not a header account",
            parent.code
        )));
    }
    if !parent.is_active() {
        return Err(LedgerError::InvalidHierarchy(format!(
            "parent {} is inactive",
            parent.code
        )));
    }
    if parent.account_type != account_type {
        return Err(LedgerError::InvalidHierarchy(format!(
            "{account_type} account cannot sit under {} parent {}",
            parent.account_type, parent.code
        )));
    }
    if moving.is_some_and(|m| parent.id == m || ancestors(accounts, parent.id).contains(&m)) {
        return Err(LedgerError::InvalidHierarchy(format!(
            "moving under {} would create a cycle",
            parent.code
        )));
    }

    let level = parent.level + 1;
    let subtree_height = moving.map_or(0, |id| height(accounts, id));
    if level + subtree_height > MAX_ACCOUNT_DEPTH {
        return Err(LedgerError::InvalidHierarchy(format!(
            "maximum depth of {MAX_ACCOUNT_DEPTH} exceeded"
        )));
    }
    Ok(level)
}

/// Ids of every ancestor of `id`, nearest first. Stops on a cycle.
pub fn ancestors(accounts: &HashMap<AccountId, Account>, id: AccountId) -> Vec<AccountId> {
    let mut seen = HashSet::from([id]);
    let mut chain = Vec::new();
    let mut current = accounts.get(&id).and_then(|a| a.parent_id);
    while let Some(parent_id) = current {
        if !seen.insert(parent_id) {
            break;
        }
        chain.push(parent_id);
        current = accounts.get(&parent_id).and_then(|a| a.parent_id);
    }
    chain
}

/// Ids of every descendant of `id`, parents before children.
pub fn descendants(accounts: &HashMap<AccountId, Account>, id: AccountId) -> Vec<AccountId> {
    let mut out = Vec::new();
    let mut frontier = vec![id];
    let mut seen = HashSet::from([id]);
    while let Some(current) = frontier.pop() {
        let mut children: Vec<&Account> = accounts
            .values()
            .filter(|a| a.parent_id == Some(current))
            .collect();
        children.sort_by(|a, b| a.code.cmp(&b.code));
        for child in children {
            if seen.insert(child.id) {
                out.push(child.id);
                frontier.push(child.id);
            }
        }
    }
    out
}

/// Number of levels below `id` (0 for a leaf).
fn height(accounts: &HashMap<AccountId, Account>, id: AccountId) -> i32 {
    let base = accounts.get(&id).map_or(1, |a| a.level);
    descendants(accounts, id)
        .iter()
        .filter_map(|d| accounts.get(d))
        .map(|a| a.level - base)
        .max()
        .unwrap_or(0)
}

/// Walks the whole chart and reports every structural problem.
///
/// `has_postings` tells whether an account has any posted lines.
pub fn audit<F>(accounts: &HashMap<AccountId, Account>, has_postings: F) -> Vec<HierarchyIssue>
where
    F: Fn(AccountId) -> bool,
{
    let mut sorted: Vec<&Account> = accounts.values().collect();
    sorted.sort_by(|a, b| a.code.cmp(&b.code));

    let mut issues = Vec::new();
    for account in sorted {
        if account.is_header && has_postings(account.id) {
            issues.push(HierarchyIssue::HeaderWithPostings {
                account_id: account.id,
            });
        }

        let Some(parent_id) = account.parent_id else {
            if account.level != 1 {
                issues.push(HierarchyIssue::LevelMismatch {
                    account_id: account.id,
                    stored: account.level,
                    actual: 1,
                });
            }
            continue;
        };

        let Some(parent) = accounts.get(&parent_id) else {
            issues.push(HierarchyIssue::Orphan {
                account_id: account.id,
                parent_id,
            });
            continue;
        };

        let chain = ancestors(accounts, account.id);
        let closes_loop = chain
            .last()
            .and_then(|top| accounts.get(top))
            .and_then(|top| top.parent_id)
            .is_some_and(|p| p == account.id || chain.contains(&p));
        if closes_loop {
            issues.push(HierarchyIssue::Circular {
                account_id: account.id,
            });
            continue;
        }

        if parent.account_type != account.account_type {
            issues.push(HierarchyIssue::TypeMismatch {
                account_id: account.id,
                account_type: account.account_type,
                parent_type: parent.account_type,
            });
        }
        if !parent.is_header {
            issues.push(HierarchyIssue::NonHeaderParent {
                account_id: account.id,
                parent_id,
            });
        }

        let depth = i32::try_from(chain.len()).unwrap_or(i32::MAX).saturating_add(1);
        if depth > MAX_ACCOUNT_DEPTH {
            issues.push(HierarchyIssue::TooDeep {
                account_id: account.id,
                depth,
            });
        }
        if depth != account.level {
            issues.push(HierarchyIssue::LevelMismatch {
                account_id: account.id,
                stored: account.level,
                actual: depth,
            });
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::types::AccountStatus;
    use chrono::Utc;

    fn account(code: &str, account_type: AccountType, parent: Option<&Account>, is_header: bool) -> Account {
        Account {
            id: AccountId::new(),
            code: code.to_string(),
            name: code.to_string(),
            account_type,
            category: None,
            parent_id: parent.map(|p| p.id),
            level: parent.map_or(1, |p| p.level + 1),
            is_header,
            is_system_critical: false,
            status: AccountStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn index(accounts: &[&Account]) -> HashMap<AccountId, Account> {
        accounts.iter().map(|a| (a.id, (*a).clone())).collect()
    }

    #[test]
    fn test_child_level_under_header() {
        let assets = account("1000", AccountType::Asset, None, true);
        let map = index(&[&assets]);
        assert_eq!(check_parent(&map, AccountType::Asset, &assets, None).unwrap(), 2);
    }

    #[test]
    fn test_rejects_non_header_parent() {
        let kas = account("1101", AccountType::Asset, None, false);
        let map = index(&[&kas]);
        let err = check_parent(&map, AccountType::Asset, &kas, None).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidHierarchy(_)));
    }

    #[test]
    fn test_rejects_type_mismatch() {
        let assets = account("1000", AccountType::Asset, None, true);
        let map = index(&[&assets]);
        let err = check_parent(&map, AccountType::Revenue, &assets, None).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidHierarchy(_)));
    }

    #[test]
    fn test_rejects_cycle_on_move() {
        let root = account("1000", AccountType::Asset, None, true);
        let child = account("1100", AccountType::Asset, Some(&root), true);
        let map = index(&[&root, &child]);

        let err = check_parent(&map, AccountType::Asset, &child, Some(root.id)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidHierarchy(_)));

        let err = check_parent(&map, AccountType::Asset, &root, Some(root.id)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidHierarchy(_)));
    }

    #[test]
    fn test_rejects_excessive_depth() {
        let mut chain = vec![account("1", AccountType::Asset, None, true)];
        for depth in 2..=MAX_ACCOUNT_DEPTH {
            let next = account(&depth.to_string(), AccountType::Asset, chain.last(), true);
            chain.push(next);
        }
        let map = index(&chain.iter().collect::<Vec<_>>());
        let deepest = chain.last().unwrap();
        let err = check_parent(&map, AccountType::Asset, deepest, None).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidHierarchy(_)));
    }

    #[test]
    fn test_descendants_and_ancestors() {
        let root = account("1000", AccountType::Asset, None, true);
        let mid = account("1100", AccountType::Asset, Some(&root), true);
        let leaf = account("1101", AccountType::Asset, Some(&mid), false);
        let map = index(&[&root, &mid, &leaf]);

        assert_eq!(ancestors(&map, leaf.id), vec![mid.id, root.id]);
        assert_eq!(descendants(&map, root.id), vec![mid.id, leaf.id]);
    }

    #[test]
    fn test_audit_reports_problems() {
        let root = account("1000", AccountType::Asset, None, true);
        let mut wrong_type = account("4100", AccountType::Revenue, Some(&root), false);
        wrong_type.level = 3;
        let mut orphan = account("1200", AccountType::Asset, None, false);
        let missing = AccountId::new();
        orphan.parent_id = Some(missing);
        let map = index(&[&root, &wrong_type, &orphan]);

        let issues = audit(&map, |id| id == root.id);

        assert!(issues.contains(&HierarchyIssue::HeaderWithPostings { account_id: root.id }));
        assert!(issues.contains(&HierarchyIssue::Orphan {
            account_id: orphan.id,
            parent_id: missing,
        }));
        assert!(issues.contains(&HierarchyIssue::TypeMismatch {
            account_id: wrong_type.id,
            account_type: AccountType::Revenue,
            parent_type: AccountType::Asset,
        }));
        assert!(issues.contains(&HierarchyIssue::LevelMismatch {
            account_id: wrong_type.id,
            stored: 3,
            actual: 2,
        }));
    }

    #[test]
    fn test_audit_detects_cycle() {
        let mut a = account("1000", AccountType::Asset, None, true);
        let mut b = account("1100", AccountType::Asset, Some(&a), true);
        a.parent_id = Some(b.id);
        a.level = 2;
        b.level = 1;
        let map = index(&[&a, &b]);

        let issues = audit(&map, |_| false);
        assert!(issues.contains(&HierarchyIssue::Circular { account_id: a.id }));
        assert!(issues.contains(&HierarchyIssue::Circular { account_id: b.id }));
    }
}
