//! Audit trail records.
//!
//! Every state change appends one record. Nothing is soft-deleted; the trail
//! says what happened and when.

use buku_shared::types::AuditId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of record the audit entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEntity {
    /// Chart of accounts entry.
    Account,
    /// Journal entry.
    JournalEntry,
    /// Accounting period.
    Period,
    /// Reconciliation snapshot.
    Snapshot,
    /// Reconciliation.
    Reconciliation,
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Record created.
    Created,
    /// Account deactivated.
    Deactivated,
    /// Account re-parented.
    Moved,
    /// Entry posted.
    Posted,
    /// Entry reversed by a mirror entry.
    Reversed,
    /// Draft discarded.
    Discarded,
    /// Period closed.
    Closed,
    /// Period reopened.
    Reopened,
    /// Period or snapshot locked.
    Locked,
    /// Snapshot rows recaptured.
    Refreshed,
    /// Snapshot superseded by a newer capture.
    Superseded,
    /// Snapshot archived.
    Archived,
    /// Reconciliation approved.
    Approved,
    /// Reconciliation rejected.
    Rejected,
    /// Difference resolved.
    Resolved,
    /// Hash mismatch detected.
    IntegrityViolation,
}

/// One audit trail record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique identifier.
    pub id: AuditId,
    /// Kind of record.
    pub entity: AuditEntity,
    /// Id of the record.
    pub entity_id: Uuid,
    /// What happened.
    pub action: AuditAction,
    /// Extra context.
    pub detail: serde_json::Value,
    /// When it happened.
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Creates a record stamped now.
    pub fn new(entity: AuditEntity, entity_id: impl Into<Uuid>, action: AuditAction, detail: serde_json::Value) -> Self {
        Self {
            id: AuditId::new(),
            entity,
            entity_id: entity_id.into(),
            action,
            detail,
            recorded_at: Utc::now(),
        }
    }
}
