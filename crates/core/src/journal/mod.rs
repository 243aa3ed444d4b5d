//! Journal aggregate and posting.
//!
//! This module implements:
//! - The in-memory entry aggregate (`JournalDraft`)
//! - Posting rules (balance, accounts, period)
//! - Reversing entries
//! - The journal service

pub mod draft;
pub(crate) mod posting;
pub mod reversal;
pub mod service;
pub mod types;
pub mod validator;

#[cfg(test)]
mod tests;
#[cfg(test)]
mod validator_props;

pub use draft::{JournalDraft, MAX_AMOUNT_SCALE};
pub use reversal::{REVERSAL_PREFIX, ReversalBuilder};
pub use service::JournalService;
pub use types::{
    EntryMeta, EntryStatus, EntryTotals, JournalEntry, JournalEntryWithLines, JournalLine, LineInput,
    PostedEntryFilter, PostedLine, SourceDocument,
};
pub use validator::PostingValidator;
