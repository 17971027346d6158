//! Reward-engine errors.

use rebase_ledger::LedgerError;
use rebase_types::{AccountId, Operation, Timestamp};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewardError {
    #[error("{caller} is not authorized to {operation}")]
    Unauthorized {
        caller: AccountId,
        operation: Operation,
    },

    #[error("cannot stake 0")]
    ZeroStake,

    #[error("cannot withdraw 0")]
    ZeroWithdraw,

    #[error("insufficient stake: requested {requested}, staked {staked}")]
    InsufficientStake { requested: u128, staked: u128 },

    #[error("reward amount must be non-zero")]
    ZeroReward,

    #[error("insufficient reward balance: need {needed}, available {available}")]
    InsufficientRewardBalance { needed: u128, available: u128 },

    #[error("reward rate {rate}/s over {duration}s exceeds unallocated balance {balance}")]
    ExcessiveRewardRate {
        rate: u128,
        duration: u64,
        balance: u128,
    },

    #[error("time {now} precedes last settlement at {last_update}")]
    InvalidTimestamp {
        now: Timestamp,
        last_update: Timestamp,
    },

    #[error("arithmetic overflow in reward computation")]
    Overflow,

    #[error("invalid engine snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("token transfer failed: {0}")]
    Token(#[from] LedgerError),
}
