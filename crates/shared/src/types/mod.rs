//! Common types used across the ledger crates.

pub mod id;

pub use id::*;
