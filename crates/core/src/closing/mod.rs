//! Period closing.
//!
//! Closing a date range zeroes revenue and expense into retained earnings
//! with one posted entry and refuses further postings into the range.
//! Reopening reverses that entry; locking makes the close permanent.

pub mod plan;
pub mod service;
pub mod types;

#[cfg(test)]
mod plan_props;

pub use plan::{CLOSING_DOC_TYPE, closing_code, closing_lines, closing_reference};
pub use service::{DEFAULT_RETAINED_EARNINGS_CODE, PeriodClosingService};
pub use types::{
    AccountingPeriod, ClosingAccountBalance, ClosingLine, ClosingPreview, ClosingTarget, LastClosingInfo,
    PeriodStatus,
};
