//! The staking reward accrual engine.

use crate::error::RewardError;
use crate::state::{DistributionPhase, RewardSchedule, StakePosition};
use rebase_ledger::{mul_div_wide, ElasticToken, FungibleToken, LedgerError, U256};
use rebase_types::{AccessGate, AccountId, Operation, RewardParams, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// The reward engine: stake positions plus one global accumulator.
///
/// The engine owns no tokens. Every operation borrows the stake token and/or
/// the reward token and moves funds through the `custody` account. Each
/// operation works on copies of the schedule and the caller's position and
/// commits them only after every transfer has succeeded, so a failure leaves
/// the engine untouched.
pub struct RewardAccrualEngine {
    custody: AccountId,
    schedule: RewardSchedule,
    positions: HashMap<AccountId, StakePosition>,
    total_staked: u128,
    gate: Arc<dyn AccessGate>,
}

/// Serializable image of the engine, without its access gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub custody: AccountId,
    pub schedule: RewardSchedule,
    pub positions: BTreeMap<AccountId, StakePosition>,
    pub total_staked: u128,
}

impl RewardAccrualEngine {
    pub fn new(custody: AccountId, params: &RewardParams, gate: Arc<dyn AccessGate>) -> Self {
        Self {
            custody,
            schedule: RewardSchedule::new(params.rewards_duration_secs),
            positions: HashMap::new(),
            total_staked: 0,
            gate,
        }
    }

    /// Restore an engine, checking that positions add up to `total_staked`.
    pub fn from_snapshot(
        snapshot: EngineSnapshot,
        gate: Arc<dyn AccessGate>,
    ) -> Result<Self, RewardError> {
        let mut sum: u128 = 0;
        for position in snapshot.positions.values() {
            sum = sum
                .checked_add(position.staked_amount)
                .ok_or(RewardError::Overflow)?;
        }
        if sum != snapshot.total_staked {
            return Err(RewardError::InvalidSnapshot(format!(
                "positions stake {sum}, total_staked is {}",
                snapshot.total_staked
            )));
        }
        if snapshot.schedule.claimed_shares > snapshot.schedule.distributed_shares {
            return Err(RewardError::InvalidSnapshot(
                "claimed shares exceed distributed shares".to_string(),
            ));
        }
        Ok(Self {
            custody: snapshot.custody,
            schedule: snapshot.schedule,
            positions: snapshot.positions.into_iter().collect(),
            total_staked: snapshot.total_staked,
            gate,
        })
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            custody: self.custody.clone(),
            schedule: self.schedule.clone(),
            positions: self
                .positions
                .iter()
                .map(|(id, p)| (id.clone(), p.clone()))
                .collect(),
            total_staked: self.total_staked,
        }
    }

    // ── Reads ──────────────────────────────────────────────────────────

    /// The account holding staked tokens and undistributed rewards.
    pub fn custody(&self) -> &AccountId {
        &self.custody
    }

    pub fn schedule(&self) -> &RewardSchedule {
        &self.schedule
    }

    pub fn total_staked(&self) -> u128 {
        self.total_staked
    }

    pub fn staked_balance_of(&self, staker: &AccountId) -> u128 {
        self.positions
            .get(staker)
            .map(|p| p.staked_amount)
            .unwrap_or(0)
    }

    pub fn position(&self, staker: &AccountId) -> Option<&StakePosition> {
        self.positions.get(staker)
    }

    pub fn staker_count(&self) -> usize {
        self.positions.len()
    }

    pub fn period_finish(&self) -> Timestamp {
        self.schedule.period_finish
    }

    pub fn rewards_duration(&self) -> u64 {
        self.schedule.rewards_duration
    }

    pub fn last_time_reward_applicable(&self, now: Timestamp) -> Timestamp {
        self.schedule.last_time_reward_applicable(now)
    }

    pub fn phase(&self, now: Timestamp) -> DistributionPhase {
        self.schedule.phase(now)
    }

    /// Reward emitted per second, in current reward-token units.
    pub fn reward_rate<R: ElasticToken>(&self, reward_token: &R) -> u128 {
        reward_token
            .scaling_factor()
            .to_balance(self.schedule.reward_rate)
    }

    /// Total reward of one full window at the current rate, in current units.
    pub fn reward_for_duration<R: ElasticToken>(&self, reward_token: &R) -> u128 {
        let shares = self
            .schedule
            .reward_rate
            .saturating_mul(u128::from(self.schedule.rewards_duration));
        reward_token.scaling_factor().to_balance(shares)
    }

    /// Reward per staked unit, scaled by [`PRECISION`](crate::PRECISION), in
    /// current reward-token units.
    ///
    /// Reflects any rebase of the reward token immediately.
    pub fn reward_per_share<R: ElasticToken>(
        &self,
        reward_token: &R,
        now: Timestamp,
    ) -> Result<U256, RewardError> {
        let shares = self
            .schedule
            .reward_per_share_at(now, self.total_staked)
            .ok_or(RewardError::Overflow)?;
        if shares.is_zero() {
            return Ok(shares);
        }
        let factor = reward_token.scaling_factor();
        mul_div_wide(shares, factor.numerator, factor.denominator).ok_or(RewardError::Overflow)
    }

    /// Settled plus unsettled reward of `staker`, in current reward-token units.
    pub fn earned<R: ElasticToken>(
        &self,
        reward_token: &R,
        staker: &AccountId,
        now: Timestamp,
    ) -> Result<u128, RewardError> {
        let shares = self.earned_shares(staker, now)?;
        reward_token
            .scaling_factor()
            .to_balance_checked(shares)
            .ok_or(RewardError::Overflow)
    }

    /// Settled plus unsettled reward of `staker`, in reward-token shares.
    pub fn earned_shares(&self, staker: &AccountId, now: Timestamp) -> Result<u128, RewardError> {
        let Some(position) = self.positions.get(staker) else {
            return Ok(0);
        };
        let reward_per_share = self
            .schedule
            .reward_per_share_at(now, self.total_staked)
            .ok_or(RewardError::Overflow)?;
        position
            .earned_shares(reward_per_share)
            .ok_or(RewardError::Overflow)
    }

    /// Custody reward balance not yet promised to anyone, in current units.
    ///
    /// `custody - (emitted - claimed) - still scheduled`.
    pub fn unallocated_rewards<R: ElasticToken>(
        &self,
        reward_token: &R,
        now: Timestamp,
    ) -> Result<u128, RewardError> {
        let shares = self.unallocated_shares(reward_token, now)?;
        reward_token
            .scaling_factor()
            .to_balance_checked(shares)
            .ok_or(RewardError::Overflow)
    }

    fn unallocated_shares<R: ElasticToken>(
        &self,
        reward_token: &R,
        now: Timestamp,
    ) -> Result<u128, RewardError> {
        let pending = self
            .schedule
            .pending_emission(now, self.total_staked)
            .ok_or(RewardError::Overflow)?;
        let remaining = self
            .schedule
            .remaining_emission(now)
            .ok_or(RewardError::Overflow)?;
        let committed = self
            .schedule
            .outstanding_shares()
            .checked_add(pending)
            .and_then(|c| c.checked_add(remaining))
            .ok_or(RewardError::Overflow)?;
        Ok(reward_token
            .shares_of(&self.custody)
            .saturating_sub(committed))
    }

    // ── Mutations ──────────────────────────────────────────────────────

    /// Deposit `amount` stake tokens from `staker` into custody.
    pub fn stake<S: FungibleToken>(
        &mut self,
        stake_token: &mut S,
        staker: &AccountId,
        amount: u128,
        now: Timestamp,
    ) -> Result<(), RewardError> {
        if amount == 0 {
            return Err(RewardError::ZeroStake);
        }
        let (schedule, mut position) = self.settled(Some(staker), now)?;
        position.staked_amount = position
            .staked_amount
            .checked_add(amount)
            .ok_or(RewardError::Overflow)?;
        let total_staked = self
            .total_staked
            .checked_add(amount)
            .ok_or(RewardError::Overflow)?;

        stake_token.transfer_from(staker, &self.custody, amount)?;

        self.commit(schedule, staker, position, total_staked);
        tracing::info!(
            %staker,
            amount,
            total_staked,
            reward_per_share = %self.schedule.reward_per_share_stored,
            "staked"
        );
        Ok(())
    }

    /// Return `amount` stake tokens from custody to `staker`.
    pub fn withdraw<S: FungibleToken>(
        &mut self,
        stake_token: &mut S,
        staker: &AccountId,
        amount: u128,
        now: Timestamp,
    ) -> Result<(), RewardError> {
        if amount == 0 {
            return Err(RewardError::ZeroWithdraw);
        }
        let (schedule, mut position) = self.settled(Some(staker), now)?;
        if amount > position.staked_amount {
            return Err(RewardError::InsufficientStake {
                requested: amount,
                staked: position.staked_amount,
            });
        }
        position.staked_amount -= amount;
        let total_staked = self
            .total_staked
            .checked_sub(amount)
            .ok_or(RewardError::Overflow)?;

        stake_token.transfer_from(&self.custody, staker, amount)?;

        self.commit(schedule, staker, position, total_staked);
        tracing::info!(
            %staker,
            amount,
            total_staked,
            reward_per_share = %self.schedule.reward_per_share_stored,
            "withdrawn"
        );
        Ok(())
    }

    /// Pay everything `staker` has earned. Returns the amount paid in
    /// current reward-token units; zero when nothing is owed.
    pub fn get_reward<R: ElasticToken>(
        &mut self,
        reward_token: &mut R,
        staker: &AccountId,
        now: Timestamp,
    ) -> Result<u128, RewardError> {
        let (mut schedule, mut position) = self.settled(Some(staker), now)?;
        let owed = position.rewards_owed;
        if owed > 0 {
            reward_token.transfer_shares(&self.custody, staker, owed)?;
            position.rewards_owed = 0;
            schedule.claimed_shares = schedule
                .claimed_shares
                .checked_add(owed)
                .ok_or(RewardError::Overflow)?;
        }
        let total_staked = self.total_staked;
        self.commit(schedule, staker, position, total_staked);

        let paid = reward_token.scaling_factor().to_balance(owed);
        if owed > 0 {
            tracing::info!(%staker, paid, shares = owed, "reward paid");
        }
        Ok(paid)
    }

    /// Withdraw the whole stake and claim all rewards in one step.
    ///
    /// Returns `(withdrawn, reward_paid)`.
    pub fn exit<S: FungibleToken, R: ElasticToken>(
        &mut self,
        stake_token: &mut S,
        reward_token: &mut R,
        staker: &AccountId,
        now: Timestamp,
    ) -> Result<(u128, u128), RewardError> {
        let (mut schedule, mut position) = self.settled(Some(staker), now)?;
        let withdrawn = position.staked_amount;
        if withdrawn == 0 {
            return Err(RewardError::ZeroWithdraw);
        }
        let owed = position.rewards_owed;
        let total_staked = self
            .total_staked
            .checked_sub(withdrawn)
            .ok_or(RewardError::Overflow)?;
        schedule.claimed_shares = schedule
            .claimed_shares
            .checked_add(owed)
            .ok_or(RewardError::Overflow)?;

        // Both legs are checked up front so neither transfer can fail after
        // the other has been applied.
        let stake_available = stake_token.balance_of(&self.custody);
        if stake_available < withdrawn {
            return Err(RewardError::Token(LedgerError::InsufficientBalance {
                needed: withdrawn,
                available: stake_available,
            }));
        }
        let reward_available = reward_token.shares_of(&self.custody);
        if reward_available < owed {
            return Err(RewardError::Token(LedgerError::InsufficientShares {
                needed: owed,
                available: reward_available,
            }));
        }
        stake_token.transfer_from(&self.custody, staker, withdrawn)?;
        if owed > 0 {
            reward_token.transfer_shares(&self.custody, staker, owed)?;
        }

        position.staked_amount = 0;
        position.rewards_owed = 0;
        self.commit(schedule, staker, position, total_staked);

        let paid = reward_token.scaling_factor().to_balance(owed);
        tracing::info!(%staker, withdrawn, paid, total_staked, "exited");
        Ok((withdrawn, paid))
    }

    /// Start a distribution window emitting `amount` reward-token units,
    /// blended with whatever the current window has left to emit.
    ///
    /// `amount` must already sit in custody. Returns the new rate in current
    /// reward-token units per second.
    pub fn start_distribution<R: ElasticToken>(
        &mut self,
        reward_token: &R,
        caller: &AccountId,
        amount: u128,
        now: Timestamp,
    ) -> Result<u128, RewardError> {
        if !self.gate.is_authorized(caller, Operation::StartDistribution) {
            return Err(RewardError::Unauthorized {
                caller: caller.clone(),
                operation: Operation::StartDistribution,
            });
        }
        if amount == 0 {
            return Err(RewardError::ZeroReward);
        }
        let available = reward_token.balance_of(&self.custody);
        if available < amount {
            return Err(RewardError::InsufficientRewardBalance {
                needed: amount,
                available,
            });
        }
        let (mut schedule, _) = self.settled(None, now)?;
        let factor = reward_token.scaling_factor();
        let amount_shares = factor.to_shares(amount).ok_or(RewardError::Overflow)?;
        let duration = u128::from(schedule.rewards_duration.max(1));

        let carried = schedule
            .remaining_emission(now)
            .ok_or(RewardError::Overflow)?;
        let total = amount_shares
            .checked_add(carried)
            .ok_or(RewardError::Overflow)?;
        let rate = total / duration;

        // Funds already emitted but unclaimed are spoken for.
        let free_shares = reward_token
            .shares_of(&self.custody)
            .saturating_sub(schedule.outstanding_shares());
        if rate.checked_mul(duration).ok_or(RewardError::Overflow)? > free_shares {
            return Err(RewardError::ExcessiveRewardRate {
                rate: factor.to_balance(rate),
                duration: schedule.rewards_duration,
                balance: factor.to_balance(free_shares),
            });
        }

        schedule.reward_rate = rate;
        schedule.last_update_time = now;
        schedule.period_finish = now.saturating_add(schedule.rewards_duration);
        schedule.started = true;
        self.schedule = schedule;

        let external_rate = factor.to_balance(rate);
        tracing::info!(
            %caller,
            amount,
            carried = factor.to_balance(carried),
            rate = external_rate,
            period_finish = %self.schedule.period_finish,
            "distribution started"
        );
        Ok(external_rate)
    }

    /// Start a distribution with everything in custody not yet allocated.
    pub fn start_distribution_from_balance<R: ElasticToken>(
        &mut self,
        reward_token: &R,
        caller: &AccountId,
        now: Timestamp,
    ) -> Result<u128, RewardError> {
        let unallocated = self.unallocated_rewards(reward_token, now)?;
        self.start_distribution(reward_token, caller, unallocated, now)
    }

    // ── Settlement ─────────────────────────────────────────────────────

    /// Settled copies of the schedule and (optionally) one position.
    fn settled(
        &self,
        staker: Option<&AccountId>,
        now: Timestamp,
    ) -> Result<(RewardSchedule, StakePosition), RewardError> {
        if now < self.schedule.last_update_time {
            return Err(RewardError::InvalidTimestamp {
                now,
                last_update: self.schedule.last_update_time,
            });
        }
        let mut schedule = self.schedule.clone();
        schedule
            .settle(now, self.total_staked)
            .ok_or(RewardError::Overflow)?;
        let mut position = staker
            .and_then(|s| self.positions.get(s).cloned())
            .unwrap_or_default();
        if staker.is_some() {
            position
                .settle(schedule.reward_per_share_stored)
                .ok_or(RewardError::Overflow)?;
        }
        tracing::debug!(
            reward_per_share = %schedule.reward_per_share_stored,
            last_update = %schedule.last_update_time,
            "settled"
        );
        Ok((schedule, position))
    }

    fn commit(
        &mut self,
        schedule: RewardSchedule,
        staker: &AccountId,
        position: StakePosition,
        total_staked: u128,
    ) {
        self.schedule = schedule;
        self.total_staked = total_staked;
        // Positions are created by the first stake, never by a bare claim.
        if position != StakePosition::default() || self.positions.contains_key(staker) {
            self.positions.insert(staker.clone(), position);
        }
    }
}

impl fmt::Debug for RewardAccrualEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewardAccrualEngine")
            .field("custody", &self.custody)
            .field("schedule", &self.schedule)
            .field("stakers", &self.positions.len())
            .field("total_staked", &self.total_staked)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PRECISION;
    use rebase_ledger::ElasticLedger;
    use rebase_types::{LedgerParams, OwnerGate};

    const E18: u128 = 1_000_000_000_000_000_000;
    const DURATION: u64 = RewardParams::DEFAULT_REWARDS_DURATION_SECS;

    fn owner() -> AccountId {
        AccountId::from("owner")
    }

    fn pool() -> AccountId {
        AccountId::from("pool")
    }

    fn alice() -> AccountId {
        AccountId::from("alice")
    }

    fn bob() -> AccountId {
        AccountId::from("bob")
    }

    struct Fixture {
        reward: ElasticLedger,
        lp: ElasticLedger,
        engine: RewardAccrualEngine,
    }

    fn fixture() -> Fixture {
        let gate: Arc<dyn AccessGate> = Arc::new(OwnerGate::new(owner()));
        let reward =
            ElasticLedger::genesis(&LedgerParams::default(), owner(), gate.clone()).unwrap();
        let mut lp =
            ElasticLedger::genesis(&LedgerParams::stake_token_defaults(), owner(), gate.clone())
                .unwrap();
        lp.transfer(&owner(), &alice(), 10_000).unwrap();
        lp.transfer(&owner(), &bob(), 10_000).unwrap();
        let engine = RewardAccrualEngine::new(pool(), &RewardParams::default(), gate);
        Fixture { reward, lp, engine }
    }

    fn t(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    /// Deposit `amount` reward units and start a window at `now`.
    fn fund(f: &mut Fixture, amount: u128, now: Timestamp) -> u128 {
        f.reward.transfer(&owner(), &pool(), amount).unwrap();
        f.engine
            .start_distribution(&f.reward, &owner(), amount, now)
            .unwrap()
    }

    #[test]
    fn fresh_engine_reads() {
        let f = fixture();
        assert_eq!(f.engine.custody(), &pool());
        assert_eq!(f.engine.rewards_duration(), 4_838_400);
        assert_eq!(f.engine.reward_rate(&f.reward), 0);
        assert!(f.engine.reward_per_share(&f.reward, t(1_000)).unwrap().is_zero());
        assert_eq!(f.engine.earned(&f.reward, &alice(), t(1_000)).unwrap(), 0);
        assert_eq!(f.engine.phase(t(0)), DistributionPhase::Idle);
    }

    #[test]
    fn start_distribution_sets_rate() {
        let mut f = fixture();
        let rate = fund(&mut f, 50_000_000_000, t(0));
        assert_eq!(rate, 10_333);
        assert_eq!(f.engine.reward_rate(&f.reward), 10_333);
        assert_eq!(f.engine.period_finish(), t(DURATION));
        assert_eq!(f.engine.phase(t(1)), DistributionPhase::Active);
        assert_eq!(f.engine.phase(t(DURATION)), DistributionPhase::Expired);
        assert!(f.engine.reward_for_duration(&f.reward) <= 50_000_000_000);
    }

    #[test]
    fn start_distribution_requires_privilege() {
        let mut f = fixture();
        f.reward.transfer(&owner(), &pool(), 1_000).unwrap();
        let err = f
            .engine
            .start_distribution(&f.reward, &alice(), 1_000, t(0))
            .unwrap_err();
        assert!(matches!(err, RewardError::Unauthorized { .. }));
        assert_eq!(f.engine.phase(t(0)), DistributionPhase::Idle);
    }

    #[test]
    fn start_distribution_with_empty_custody_fails() {
        let mut f = fixture();
        let err = f
            .engine
            .start_distribution(&f.reward, &owner(), 1_000, t(0))
            .unwrap_err();
        assert_eq!(
            err,
            RewardError::InsufficientRewardBalance {
                needed: 1_000,
                available: 0
            }
        );
        assert_eq!(
            f.engine
                .start_distribution_from_balance(&f.reward, &owner(), t(0))
                .unwrap_err(),
            RewardError::ZeroReward
        );
    }

    #[test]
    fn stake_zero_and_over_withdraw_are_rejected() {
        let mut f = fixture();
        assert_eq!(
            f.engine.stake(&mut f.lp, &alice(), 0, t(0)).unwrap_err(),
            RewardError::ZeroStake
        );
        assert_eq!(
            f.engine.withdraw(&mut f.lp, &alice(), 1, t(0)).unwrap_err(),
            RewardError::InsufficientStake {
                requested: 1,
                staked: 0
            }
        );
        f.engine.stake(&mut f.lp, &alice(), 500, t(0)).unwrap();
        assert_eq!(
            f.engine.withdraw(&mut f.lp, &alice(), 501, t(1)).unwrap_err(),
            RewardError::InsufficientStake {
                requested: 501,
                staked: 500
            }
        );
        assert_eq!(
            f.engine.withdraw(&mut f.lp, &alice(), 0, t(1)).unwrap_err(),
            RewardError::ZeroWithdraw
        );
    }

    #[test]
    fn stake_moves_tokens_into_custody() {
        let mut f = fixture();
        f.engine.stake(&mut f.lp, &alice(), 500, t(0)).unwrap();
        f.engine.stake(&mut f.lp, &bob(), 300, t(0)).unwrap();
        assert_eq!(f.engine.staked_balance_of(&alice()), 500);
        assert_eq!(f.engine.staked_balance_of(&bob()), 300);
        assert_eq!(f.engine.total_staked(), 800);
        assert_eq!(f.lp.balance_of(&pool()), 800);
        assert_eq!(f.lp.balance_of(&alice()), 9_500);

        f.engine.withdraw(&mut f.lp, &alice(), 500, t(10)).unwrap();
        assert_eq!(f.engine.staked_balance_of(&alice()), 0);
        assert_eq!(f.lp.balance_of(&alice()), 10_000);
    }

    #[test]
    fn stake_without_tokens_leaves_state_unchanged() {
        let mut f = fixture();
        fund(&mut f, 50_000_000_000, t(0));
        let before = f.engine.snapshot();
        let err = f
            .engine
            .stake(&mut f.lp, &AccountId::from("carol"), 1, t(100))
            .unwrap_err();
        assert!(matches!(
            err,
            RewardError::Token(LedgerError::InsufficientBalance { .. })
        ));
        assert_eq!(f.engine.snapshot(), before);
    }

    #[test]
    fn reward_per_share_and_earned_grow_with_time() {
        let mut f = fixture();
        f.engine.stake(&mut f.lp, &alice(), 500, t(0)).unwrap();
        fund(&mut f, 50_000_000_000, t(0));

        assert!(f.engine.reward_per_share(&f.reward, t(0)).unwrap().is_zero());
        let rps = f.engine.reward_per_share(&f.reward, t(3_600)).unwrap();
        assert!(!rps.is_zero());
        let earned = f.engine.earned(&f.reward, &alice(), t(3_600)).unwrap();
        assert!(earned > 0);
        assert!(earned <= 3_600 * 10_334);
        assert_eq!(f.engine.earned(&f.reward, &bob(), t(3_600)).unwrap(), 0);
    }

    #[test]
    fn rebase_moves_earned_and_reward_per_share() {
        let mut f = fixture();
        f.engine.stake(&mut f.lp, &alice(), 500, t(0)).unwrap();
        fund(&mut f, 50_000_000_000, t(0));
        let now = t(3_600);

        let earned0 = f.engine.earned(&f.reward, &alice(), now).unwrap();
        let rps0 = f.engine.reward_per_share(&f.reward, now).unwrap();

        f.reward.rebase(&owner(), E18 as i128).unwrap();
        let earned1 = f.engine.earned(&f.reward, &alice(), now).unwrap();
        let rps1 = f.engine.reward_per_share(&f.reward, now).unwrap();
        assert!(earned1 > earned0);
        assert!(rps1 > rps0);

        f.reward.rebase(&owner(), -(2 * E18 as i128)).unwrap();
        let earned2 = f.engine.earned(&f.reward, &alice(), now).unwrap();
        let rps2 = f.engine.reward_per_share(&f.reward, now).unwrap();
        assert!(earned2 < earned1);
        assert!(earned2 < earned0);
        assert!(rps2 < rps1);
    }

    #[test]
    fn topping_up_within_window_raises_rate() {
        let mut f = fixture();
        let first = fund(&mut f, 50_000_000_000, t(0));
        let second = fund(&mut f, 20_000_000_000, t(1_000_000));
        assert!(second > first);
        assert_eq!(f.engine.period_finish(), t(1_000_000 + DURATION));
    }

    #[test]
    fn excessive_rate_is_rejected() {
        let mut f = fixture();
        f.reward.transfer(&owner(), &pool(), 1_000_000).unwrap();
        f.engine
            .start_distribution(&f.reward, &owner(), 1_000_000, t(0))
            .unwrap();
        // Custody still holds exactly what the running window will emit.
        let err = f
            .engine
            .start_distribution(&f.reward, &owner(), 1_000_000, t(10))
            .unwrap_err();
        assert!(matches!(err, RewardError::ExcessiveRewardRate { .. }));
        assert_eq!(f.engine.period_finish(), t(DURATION));
    }

    #[test]
    fn exit_pays_everything_one_second_before_finish() {
        let mut f = fixture();
        fund(&mut f, 50_000_000_000, t(0));
        f.engine.stake(&mut f.lp, &alice(), 500, t(0)).unwrap();
        let before = f.reward.balance_of(&alice());
        let now = t(DURATION - 1);

        let expected = f.engine.earned(&f.reward, &alice(), now).unwrap();
        let (withdrawn, paid) = f
            .engine
            .exit(&mut f.lp, &mut f.reward, &alice(), now)
            .unwrap();

        assert_eq!(withdrawn, 500);
        assert_eq!(paid, expected);
        assert!(f.reward.balance_of(&alice()) > before);
        assert_eq!(f.engine.earned(&f.reward, &alice(), now).unwrap(), 0);
        assert_eq!(f.engine.staked_balance_of(&alice()), 0);
        assert_eq!(f.lp.balance_of(&alice()), 10_000);
    }

    #[test]
    fn exit_with_nothing_staked_fails() {
        let mut f = fixture();
        let err = f
            .engine
            .exit(&mut f.lp, &mut f.reward, &alice(), t(0))
            .unwrap_err();
        assert_eq!(err, RewardError::ZeroWithdraw);
    }

    #[test]
    fn get_reward_with_nothing_owed_pays_zero() {
        let mut f = fixture();
        let paid = f.engine.get_reward(&mut f.reward, &alice(), t(5)).unwrap();
        assert_eq!(paid, 0);
    }

    #[test]
    fn rewards_split_by_stake_weight() {
        let mut f = fixture();
        f.engine.stake(&mut f.lp, &alice(), 300, t(0)).unwrap();
        f.engine.stake(&mut f.lp, &bob(), 100, t(0)).unwrap();
        fund(&mut f, 40_000_000_000, t(0));
        let now = t(100_000);
        let a = f.engine.earned_shares(&alice(), now).unwrap();
        let b = f.engine.earned_shares(&bob(), now).unwrap();
        assert!(a.abs_diff(3 * b) <= 3);
    }

    #[test]
    fn claims_never_exceed_emission() {
        let mut f = fixture();
        f.engine.stake(&mut f.lp, &alice(), 333, t(0)).unwrap();
        f.engine.stake(&mut f.lp, &bob(), 777, t(0)).unwrap();
        fund(&mut f, 50_000_000_000, t(0));
        f.reward.rebase(&owner(), 7 * E18 as i128).unwrap();
        f.engine.get_reward(&mut f.reward, &alice(), t(2_000_000)).unwrap();
        f.engine
            .exit(&mut f.lp, &mut f.reward, &bob(), t(DURATION + 10))
            .unwrap();
        f.engine
            .exit(&mut f.lp, &mut f.reward, &alice(), t(DURATION + 20))
            .unwrap();

        let schedule = f.engine.schedule();
        assert!(schedule.claimed_shares <= schedule.distributed_shares);
        assert!(schedule.distributed_shares <= schedule.reward_rate * u128::from(DURATION));
        assert_eq!(f.engine.phase(t(DURATION + 20)), DistributionPhase::Expired);
    }

    #[test]
    fn unallocated_rewards_and_start_from_balance() {
        let mut f = fixture();
        f.engine.stake(&mut f.lp, &alice(), 500, t(0)).unwrap();
        f.reward.transfer(&owner(), &pool(), 10 * E18).unwrap();
        assert_eq!(f.engine.unallocated_rewards(&f.reward, t(0)).unwrap(), 10 * E18);

        let rate = f
            .engine
            .start_distribution_from_balance(&f.reward, &owner(), t(0))
            .unwrap();
        assert!(rate > 0);
        let left = f.engine.unallocated_rewards(&f.reward, t(0)).unwrap();
        assert!(left < E18 / 1_000_000);

        f.reward.transfer(&owner(), &pool(), 2 * E18).unwrap();
        let left = f.engine.unallocated_rewards(&f.reward, t(1_000)).unwrap();
        assert!(left >= 2 * E18 - 1);
    }

    #[test]
    fn time_running_backward_is_rejected() {
        let mut f = fixture();
        f.engine.stake(&mut f.lp, &alice(), 500, t(100)).unwrap();
        fund(&mut f, 1_000_000, t(200));
        let err = f.engine.stake(&mut f.lp, &bob(), 1, t(150)).unwrap_err();
        assert!(matches!(err, RewardError::InvalidTimestamp { .. }));
    }

    #[test]
    fn snapshot_round_trip_and_validation() {
        let mut f = fixture();
        f.engine.stake(&mut f.lp, &alice(), 500, t(0)).unwrap();
        fund(&mut f, 50_000_000_000, t(0));
        f.engine.get_reward(&mut f.reward, &alice(), t(10_000)).unwrap();

        let snap = f.engine.snapshot();
        let bytes = bincode::serialize(&snap).unwrap();
        let decoded: EngineSnapshot = bincode::deserialize(&bytes).unwrap();
        let gate: Arc<dyn AccessGate> = Arc::new(OwnerGate::new(owner()));
        let restored = RewardAccrualEngine::from_snapshot(decoded, gate.clone()).unwrap();
        assert_eq!(restored.snapshot(), snap);

        let mut broken = snap;
        broken.total_staked += 1;
        assert!(matches!(
            RewardAccrualEngine::from_snapshot(broken, gate),
            Err(RewardError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn accumulator_precision_is_in_shares() {
        let mut f = fixture();
        f.engine.stake(&mut f.lp, &alice(), 1, t(0)).unwrap();
        fund(&mut f, 48_384, t(0));
        // 48_384 units = 48_384e9 shares over 4_838_400 s = 10_000_000 shares/s.
        assert_eq!(f.engine.schedule().reward_rate, 10_000_000);
        assert_eq!(
            f.engine.schedule().reward_per_share_at(t(1), 1),
            Some(U256::from(10_000_000 * PRECISION))
        );
    }

    #[test]
    fn small_stake_against_whole_token_rewards_can_always_leave() {
        let mut f = fixture();
        f.engine.stake(&mut f.lp, &alice(), 500, t(0)).unwrap();
        f.engine.stake(&mut f.lp, &bob(), 1, t(0)).unwrap();
        fund(&mut f, 10 * E18, t(0));
        let day = t(86_400);

        let earned = f.engine.earned(&f.reward, &alice(), day).unwrap();
        assert!(earned > 0);
        let accumulator = f
            .engine
            .schedule()
            .reward_per_share_at(day, f.engine.total_staked())
            .unwrap();
        assert!(accumulator > U256::from(u128::MAX));
        assert!(!f.engine.reward_per_share(&f.reward, day).unwrap().is_zero());

        f.engine.withdraw(&mut f.lp, &alice(), 200, day).unwrap();
        let (withdrawn, paid) = f
            .engine
            .exit(&mut f.lp, &mut f.reward, &alice(), t(2 * 86_400))
            .unwrap();
        assert_eq!(withdrawn, 300);
        assert!(paid >= earned);
        assert_eq!(f.engine.staked_balance_of(&alice()), 0);
        assert_eq!(f.lp.balance_of(&alice()), 10_000);

        // The whole remaining window goes to a single raw unit of stake.
        let (withdrawn, _) = f
            .engine
            .exit(&mut f.lp, &mut f.reward, &bob(), t(DURATION + 1))
            .unwrap();
        assert_eq!(withdrawn, 1);
        let schedule = f.engine.schedule();
        assert!(schedule.claimed_shares <= schedule.distributed_shares);
    }

    #[test]
    fn whole_supply_distribution_to_one_unit() {
        let mut f = fixture();
        f.engine.stake(&mut f.lp, &alice(), 1, t(0)).unwrap();
        let supply = f.reward.total_supply();
        fund(&mut f, supply, t(0));
        let end = t(DURATION);

        let earned = f.engine.earned(&f.reward, &alice(), end).unwrap();
        assert!(earned <= supply);
        let (_, paid) = f
            .engine
            .exit(&mut f.lp, &mut f.reward, &alice(), end)
            .unwrap();
        assert_eq!(paid, earned);
    }
}
