//! Pre-built [`tracing::Span`] constructors for staking node operations.
//!
//! Consistent span names and field sets make it easy to filter and
//! correlate a staker's operations across log lines.

use rebase_types::AccountId;
use tracing::{info_span, Span};

/// Span covering one node operation on behalf of `account`.
pub fn operation_span(operation: &str, account: &AccountId) -> Span {
    info_span!("operation", op = %operation, account = %account)
}

/// Span covering one step of a scripted scenario.
pub fn scenario_step_span(index: usize, action: &str) -> Span {
    info_span!("scenario_step", step = index, action = %action)
}
