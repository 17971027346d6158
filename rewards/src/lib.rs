//! Staking reward accrual over an elastic-supply reward token.
//!
//! Stakers deposit an opaque stake token and earn a linear emission of the
//! reward token over a fixed distribution window. All reward bookkeeping is
//! done in reward-token *shares*, so a rebase of the reward token moves every
//! externally reported figure (`reward_rate`, `reward_per_share`, `earned`)
//! without any reconciliation step.
//!
//! `reward_per_share = stored + (min(now, period_finish) - last_update) * rate * PRECISION / total_staked`
//! `earned(s)        = staked(s) * (reward_per_share - paid(s)) / PRECISION + owed(s)`
//!
//! This crate handles:
//! - Lazy accumulator settlement (checkpoint pattern, O(1) per operation)
//! - Stake, withdraw, reward claim and exit
//! - Starting and topping up distribution windows
//! - Solvency tracking of emitted versus claimed rewards

pub mod engine;
pub mod error;
pub mod state;

pub use engine::{EngineSnapshot, RewardAccrualEngine};
pub use error::RewardError;
pub use state::{accrued_reward_per_share, DistributionPhase, RewardSchedule, StakePosition, PRECISION};
