//! Ledger-specific errors.

use rebase_types::{AccountId, Operation};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("{caller} is not authorized to {operation}")]
    Unauthorized {
        caller: AccountId,
        operation: Operation,
    },

    #[error("insufficient balance: need {needed}, available {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    #[error("insufficient shares: need {needed}, available {available}")]
    InsufficientShares { needed: u128, available: u128 },

    #[error("rebase by {delta} is invalid for total supply {supply}")]
    InvalidRebase { supply: u128, delta: i128 },

    #[error("arithmetic overflow in ledger computation")]
    Overflow,

    #[error("invalid ledger snapshot: {0}")]
    InvalidSnapshot(String),
}
