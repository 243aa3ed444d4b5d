//! Store error mapping.
//!
//! SeaORM failures are folded into [`LedgerError`] here so services only ever
//! see the ledger taxonomy.

use buku_core::LedgerError;
use sea_orm::{DbErr, RuntimeErr, SqlErr};

/// SQLSTATE codes that mean "another transaction got in the way, retry".
const RETRYABLE_SQLSTATES: [&str; 3] = [
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
];

/// Errors raised by the PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// A status or kind column holds a value no domain enum knows.
    #[error("Column {column} holds unknown value {value:?}")]
    UnknownValue {
        /// Column name.
        column: &'static str,
        /// Raw value.
        value: String,
    },
}

/// SQLSTATE of a database error, if the driver reported one.
pub fn sqlstate(err: &DbErr) -> Option<String> {
    let runtime = match err {
        DbErr::Exec(e) | DbErr::Query(e) | DbErr::Conn(e) => e,
        _ => return None,
    };
    match runtime {
        RuntimeErr::SqlxError(e) => e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned()),
        _ => None,
    }
}

/// Returns true if `err` violates the unique index named `index`.
pub fn violates_unique(err: &DbErr, index: &str) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(message)) if message.contains(index))
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(db) => {
                if sqlstate(&db).is_some_and(|code| RETRYABLE_SQLSTATES.contains(&code.as_str())) {
                    Self::Concurrency(db.to_string())
                } else {
                    Self::Storage(db.to_string())
                }
            }
            other @ StoreError::UnknownValue { .. } => Self::Storage(other.to_string()),
        }
    }
}

/// Maps a raw SeaORM error into the ledger taxonomy.
pub(crate) fn db_err(err: DbErr) -> LedgerError {
    StoreError::from(err).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_errors_are_storage() {
        let err: LedgerError = StoreError::Database(DbErr::Custom("boom".into())).into();
        assert!(matches!(err, LedgerError::Storage(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unknown_value_is_storage() {
        let err: LedgerError = StoreError::UnknownValue {
            column: "status",
            value: "WEIRD".into(),
        }
        .into();
        assert_eq!(
            err,
            LedgerError::Storage("Column status holds unknown value \"WEIRD\"".into())
        );
    }

    #[test]
    fn test_record_not_updated_has_no_sqlstate() {
        assert!(sqlstate(&DbErr::RecordNotUpdated).is_none());
    }
}
