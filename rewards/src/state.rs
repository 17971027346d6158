//! Global reward schedule, per-staker positions and the pure accrual function.

use rebase_ledger::{mul_div_wide, u256_dec, U256};
use rebase_types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-point scale of the reward-per-share accumulator.
pub const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Where the schedule stands relative to its distribution window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionPhase {
    /// No distribution has ever been started.
    Idle,
    /// `now < period_finish`; rewards are emitting.
    Active,
    /// The window has passed; the rate stays frozen until the next start.
    Expired,
}

impl fmt::Display for DistributionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// `stored + elapsed * rate * PRECISION / total_staked`.
///
/// The accumulator is 256 bits wide: a pool whose reward token carries many
/// shares per unit, staked by a handful of raw stake units, pushes
/// `emitted * PRECISION / total_staked` far past 128 bits.
///
/// With nothing staked there is nobody to accrue to and `stored` is returned
/// unchanged. `None` on overflow.
pub fn accrued_reward_per_share(
    stored: U256,
    elapsed_secs: u64,
    rate: u128,
    total_staked: u128,
) -> Option<U256> {
    if total_staked == 0 || elapsed_secs == 0 || rate == 0 {
        return Some(stored);
    }
    let emitted = U256::from(rate).checked_mul(U256::from(elapsed_secs))?;
    let increment = mul_div_wide(emitted, PRECISION, total_staked)?;
    stored.checked_add(increment)
}

/// The singleton emission schedule, in reward-token shares.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSchedule {
    /// Reward-token shares emitted per second.
    pub reward_rate: u128,
    pub period_finish: Timestamp,
    /// Length of every distribution window in seconds.
    pub rewards_duration: u64,
    /// Time up to which `reward_per_share_stored` is settled.
    pub last_update_time: Timestamp,
    /// Shares per staked unit, scaled by [`PRECISION`]. Never decreases.
    #[serde(with = "u256_dec")]
    pub reward_per_share_stored: U256,
    /// Cumulative shares emitted while someone was staked.
    pub distributed_shares: u128,
    /// Cumulative shares paid out to stakers.
    pub claimed_shares: u128,
    /// Whether a distribution has ever been started.
    pub started: bool,
}

impl RewardSchedule {
    pub fn new(rewards_duration: u64) -> Self {
        Self {
            reward_rate: 0,
            period_finish: Timestamp::EPOCH,
            rewards_duration,
            last_update_time: Timestamp::EPOCH,
            reward_per_share_stored: U256::zero(),
            distributed_shares: 0,
            claimed_shares: 0,
            started: false,
        }
    }

    /// `min(now, period_finish)`.
    pub fn last_time_reward_applicable(&self, now: Timestamp) -> Timestamp {
        now.min(self.period_finish)
    }

    pub fn phase(&self, now: Timestamp) -> DistributionPhase {
        if !self.started {
            DistributionPhase::Idle
        } else if now < self.period_finish {
            DistributionPhase::Active
        } else {
            DistributionPhase::Expired
        }
    }

    /// Seconds of emission not yet folded into the accumulator.
    fn unsettled_secs(&self, now: Timestamp) -> u64 {
        self.last_update_time
            .elapsed_since(self.last_time_reward_applicable(now))
    }

    /// Shares emitted to stakers since the last settlement.
    pub fn pending_emission(&self, now: Timestamp, total_staked: u128) -> Option<u128> {
        if total_staked == 0 {
            return Some(0);
        }
        self.reward_rate
            .checked_mul(u128::from(self.unsettled_secs(now)))
    }

    /// Shares still scheduled to emit after `now` in the current window.
    pub fn remaining_emission(&self, now: Timestamp) -> Option<u128> {
        let remaining_secs = now.elapsed_since(self.period_finish);
        self.reward_rate.checked_mul(u128::from(remaining_secs))
    }

    /// The accumulator as it would read if settled at `now`.
    pub fn reward_per_share_at(&self, now: Timestamp, total_staked: u128) -> Option<U256> {
        accrued_reward_per_share(
            self.reward_per_share_stored,
            self.unsettled_secs(now),
            self.reward_rate,
            total_staked,
        )
    }

    /// Fold elapsed emission into the accumulator.
    pub fn settle(&mut self, now: Timestamp, total_staked: u128) -> Option<()> {
        let reward_per_share = self.reward_per_share_at(now, total_staked)?;
        let emitted = self.pending_emission(now, total_staked)?;
        self.distributed_shares = self.distributed_shares.checked_add(emitted)?;
        self.reward_per_share_stored = reward_per_share;
        self.last_update_time = self
            .last_update_time
            .max(self.last_time_reward_applicable(now));
        Some(())
    }

    /// Shares emitted but not yet claimed.
    pub fn outstanding_shares(&self) -> u128 {
        self.distributed_shares.saturating_sub(self.claimed_shares)
    }
}

/// One staker's position.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePosition {
    /// Stake-token units deposited.
    pub staked_amount: u128,
    /// Accumulator value at this staker's last settlement.
    #[serde(with = "u256_dec")]
    pub reward_per_share_paid: U256,
    /// Settled, unclaimed reward in reward-token shares.
    pub rewards_owed: u128,
}

impl StakePosition {
    /// Owed plus unsettled reward in shares, against `reward_per_share`.
    ///
    /// The result is bounded by what was emitted while this stake was in, so
    /// it always narrows back to 128 bits.
    pub fn earned_shares(&self, reward_per_share: U256) -> Option<u128> {
        let delta = reward_per_share.saturating_sub(self.reward_per_share_paid);
        let accrued = mul_div_wide(delta, self.staked_amount, PRECISION)?;
        u128::try_from(accrued).ok()?.checked_add(self.rewards_owed)
    }

    /// Checkpoint: move unsettled reward into `rewards_owed`.
    pub fn settle(&mut self, reward_per_share: U256) -> Option<()> {
        self.rewards_owed = self.earned_shares(reward_per_share)?;
        self.reward_per_share_paid = reward_per_share;
        Some(())
    }
}
