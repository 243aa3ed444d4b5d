//! Typed IDs for ledger records.
//!
//! A `JournalEntryId` can never be handed to something expecting an `AccountId`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a typed UUID wrapper.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new time-ordered ID (UUID v7).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(AccountId, "Identifier of a chart of accounts entry.");
typed_id!(JournalEntryId, "Identifier of a journal entry.");
typed_id!(JournalLineId, "Identifier of a single journal line.");
typed_id!(PeriodId, "Identifier of an accounting period.");
typed_id!(SnapshotId, "Identifier of a reconciliation snapshot.");
typed_id!(
    TransactionSnapshotId,
    "Identifier of a frozen transaction row inside a snapshot."
);
typed_id!(ReconciliationId, "Identifier of a snapshot comparison.");
typed_id!(DifferenceId, "Identifier of a reconciliation difference.");
typed_id!(AuditId, "Identifier of an audit log record.");
