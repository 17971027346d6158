//! The global scaling factor relating shares to external balance units.

use crate::math::mul_div;
use serde::{Deserialize, Serialize};

/// `numerator / denominator` external units per share, tagged with the
/// rebase epoch that produced it.
///
/// For a ledger, `numerator` is the total supply and `denominator` the total
/// share count. The factor is passed by value into every conversion; callers
/// never hold a converted balance across an operation boundary, because the
/// next rebase would make it stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingFactor {
    pub numerator: u128,
    pub denominator: u128,
    /// Incremented by every rebase.
    pub epoch: u64,
}

impl ScalingFactor {
    pub fn new(numerator: u128, denominator: u128, epoch: u64) -> Self {
        Self {
            numerator,
            denominator,
            epoch,
        }
    }

    /// One unit per share.
    pub fn identity() -> Self {
        Self::new(1, 1, 0)
    }

    /// External units for `shares`, rounded down.
    ///
    /// `None` if the factor is undefined (no shares) or the result overflows.
    pub fn to_balance_checked(&self, shares: u128) -> Option<u128> {
        if shares == 0 {
            return Some(0);
        }
        mul_div(shares, self.numerator, self.denominator)
    }

    /// External units for `shares`, rounded down.
    ///
    /// An undefined factor reads as zero and an overflowing result saturates.
    /// For any `shares <= denominator` the result is exact and never exceeds
    /// `numerator`.
    pub fn to_balance(&self, shares: u128) -> u128 {
        if self.denominator == 0 {
            return 0;
        }
        self.to_balance_checked(shares).unwrap_or(u128::MAX)
    }

    /// Shares corresponding to `amount` external units, rounded down.
    ///
    /// `None` when a non-zero amount is converted through a zero supply or
    /// the result overflows.
    pub fn to_shares(&self, amount: u128) -> Option<u128> {
        if amount == 0 {
            return Some(0);
        }
        mul_div(amount, self.denominator, self.numerator)
    }
}

impl Default for ScalingFactor {
    fn default() -> Self {
        Self::identity()
    }
}
