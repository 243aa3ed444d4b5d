//! Shared identifiers, errors, and configuration for the Buku ledger.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for ledger records
//! - Application-wide error taxonomy
//! - Configuration loading

pub mod config;
pub mod error;
pub mod types;

pub use config::LedgerConfig;
pub use error::{AppError, AppResult};
