//! Shared utilities for the rebase staking engine.

pub mod amount;
pub mod duration;

pub use amount::{format_amount, parse_amount, AmountParseError};
pub use duration::format_duration;
