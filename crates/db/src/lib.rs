//! PostgreSQL persistence for the Buku ledger.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - The SQL migration with the immutability triggers
//! - `PgLedgerStore`, the PostgreSQL implementation of the core store traits

pub mod entities;
pub mod error;
pub mod migration;
pub mod store;

pub use error::StoreError;
pub use migration::Migrator;
pub use store::{DEFAULT_LOCK_TIMEOUT, PgLedgerStore, PgLedgerTx};

use std::time::Duration;

use buku_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection pool sized from configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}
