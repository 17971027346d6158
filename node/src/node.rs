//! The staking node: both ledgers and the reward engine behind one lock.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rebase_ledger::{u256_dec, ElasticLedger, FungibleToken, LedgerSnapshot, U256};
use rebase_rewards::{DistributionPhase, EngineSnapshot, RewardAccrualEngine};
use rebase_types::{AccessGate, AccountId, Clock, OwnerGate, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::config::NodeConfig;
use crate::metrics::NodeMetrics;
use crate::tracing_spans::operation_span;
use crate::NodeError;

/// Which of the two ledgers a plain transfer targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Reward,
    Stake,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reward => f.write_str("reward"),
            Self::Stake => f.write_str("stake"),
        }
    }
}

/// Everything a node mutates, guarded together.
#[derive(Debug)]
pub struct PoolState {
    pub reward_token: ElasticLedger,
    pub stake_token: ElasticLedger,
    pub engine: RewardAccrualEngine,
}

impl PoolState {
    /// Fresh ledgers minted to the owner and an idle engine.
    pub fn genesis(config: &NodeConfig, gate: Arc<dyn AccessGate>) -> Result<Self, NodeError> {
        Ok(Self {
            reward_token: ElasticLedger::genesis(
                &config.reward_token,
                config.owner.clone(),
                gate.clone(),
            )?,
            stake_token: ElasticLedger::genesis(
                &config.stake_token,
                config.owner.clone(),
                gate.clone(),
            )?,
            engine: RewardAccrualEngine::new(config.pool_account.clone(), &config.rewards, gate),
        })
    }

    pub fn snapshot(&self, saved_at: Timestamp) -> NodeSnapshot {
        NodeSnapshot {
            saved_at,
            reward_token: self.reward_token.snapshot(),
            stake_token: self.stake_token.snapshot(),
            engine: self.engine.snapshot(),
        }
    }

    pub fn from_snapshot(
        snapshot: NodeSnapshot,
        gate: Arc<dyn AccessGate>,
    ) -> Result<Self, NodeError> {
        Ok(Self {
            reward_token: ElasticLedger::from_snapshot(snapshot.reward_token, gate.clone())?,
            stake_token: ElasticLedger::from_snapshot(snapshot.stake_token, gate.clone())?,
            engine: RewardAccrualEngine::from_snapshot(snapshot.engine, gate)?,
        })
    }
}

/// Persisted image of a [`PoolState`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Clock reading when the snapshot was taken.
    pub saved_at: Timestamp,
    pub reward_token: LedgerSnapshot,
    pub stake_token: LedgerSnapshot,
    pub engine: EngineSnapshot,
}

/// One account's view of the pool, in current raw units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakerView {
    pub account: AccountId,
    pub now: Timestamp,
    pub reward_balance: u128,
    pub stake_balance: u128,
    pub staked: u128,
    pub earned: u128,
}

/// Global view of the pool, in current raw units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolView {
    pub now: Timestamp,
    pub phase: DistributionPhase,
    pub period_finish: Timestamp,
    pub reward_rate: u128,
    /// Scaled by `rebase_rewards::PRECISION`; written as a decimal string.
    #[serde(with = "u256_dec")]
    pub reward_per_share: U256,
    pub reward_for_duration: u128,
    pub unallocated_rewards: u128,
    pub total_staked: u128,
    pub stakers: usize,
    pub reward_supply: u128,
    pub reward_epoch: u64,
}

/// A staking pool node.
///
/// All mutations are serialized through one async mutex; the clock is read
/// inside the lock so operation order and timestamps agree.
pub struct StakingNode {
    pub config: NodeConfig,
    pub state: Arc<Mutex<PoolState>>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<NodeMetrics>,
}

impl StakingNode {
    /// Start a node from genesis.
    pub fn new(config: NodeConfig, clock: Arc<dyn Clock>) -> Result<Self, NodeError> {
        config.validate()?;
        let state = PoolState::genesis(&config, Self::gate_for(&config))?;
        Self::with_state(config, clock, state)
    }

    /// Restore a node from a bincode snapshot file.
    pub fn load_snapshot(
        config: NodeConfig,
        clock: Arc<dyn Clock>,
        path: impl AsRef<Path>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let bytes = std::fs::read(path.as_ref())?;
        let snapshot: NodeSnapshot =
            bincode::deserialize(&bytes).map_err(|e| NodeError::Snapshot(e.to_string()))?;
        if snapshot.engine.custody != config.pool_account {
            return Err(NodeError::Snapshot(format!(
                "snapshot pool account {} does not match configured {}",
                snapshot.engine.custody, config.pool_account
            )));
        }
        let saved_at = snapshot.saved_at;
        let state = PoolState::from_snapshot(snapshot, Self::gate_for(&config))?;
        tracing::info!(path = %path.as_ref().display(), %saved_at, "pool state restored");
        Self::with_state(config, clock, state)
    }

    /// Start from the configured snapshot if one exists, genesis otherwise.
    pub fn open(config: NodeConfig, clock: Arc<dyn Clock>) -> Result<Self, NodeError> {
        match config.snapshot_path.clone() {
            Some(path) if path.exists() => Self::load_snapshot(config, clock, path),
            _ => Self::new(config, clock),
        }
    }

    fn with_state(
        config: NodeConfig,
        clock: Arc<dyn Clock>,
        state: PoolState,
    ) -> Result<Self, NodeError> {
        let metrics = NodeMetrics::new()?;
        let node = Self {
            config,
            state: Arc::new(Mutex::new(state)),
            clock,
            metrics: Arc::new(metrics),
        };
        if let Ok(state) = node.state.try_lock() {
            node.update_gauges(&state);
        }
        Ok(node)
    }

    fn gate_for(config: &NodeConfig) -> Arc<dyn AccessGate> {
        Arc::new(OwnerGate::new(config.owner.clone()))
    }

    /// Write the full pool state to `path` as bincode.
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), NodeError> {
        let snapshot = self.snapshot().await;
        let bytes =
            bincode::serialize(&snapshot).map_err(|e| NodeError::Snapshot(e.to_string()))?;
        tokio::fs::write(path.as_ref(), bytes).await?;
        tracing::info!(path = %path.as_ref().display(), saved_at = %snapshot.saved_at, "pool state saved");
        Ok(())
    }

    pub async fn snapshot(&self) -> NodeSnapshot {
        let state = self.state.lock().await;
        state.snapshot(self.clock.now())
    }

    // ── Operations ─────────────────────────────────────────────────────

    /// Plain transfer on either ledger. Funding the pool is a reward-token
    /// transfer to its custody account.
    pub async fn transfer(
        &self,
        token: TokenKind,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), NodeError> {
        let span = operation_span("transfer", from);
        async {
            let mut state = self.state.lock().await;
            let ledger = match token {
                TokenKind::Reward => &mut state.reward_token,
                TokenKind::Stake => &mut state.stake_token,
            };
            let result = ledger.transfer(from, to, amount).map(|_| ());
            self.finish("transfer", &state, result.map_err(NodeError::from))
        }
        .instrument(span)
        .await
    }

    /// Rebase the reward token. Returns the new total supply.
    pub async fn rebase(&self, caller: &AccountId, delta: i128) -> Result<u128, NodeError> {
        let span = operation_span("rebase", caller);
        async {
            let mut state = self.state.lock().await;
            let result = state.reward_token.rebase(caller, delta);
            if result.is_ok() {
                self.metrics.rebases.inc();
            }
            self.finish("rebase", &state, result.map_err(NodeError::from))
        }
        .instrument(span)
        .await
    }

    pub async fn stake(&self, staker: &AccountId, amount: u128) -> Result<(), NodeError> {
        let span = operation_span("stake", staker);
        async {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            let PoolState {
                stake_token, engine, ..
            } = &mut *state;
            let result = engine.stake(stake_token, staker, amount, now);
            self.finish("stake", &state, result.map_err(NodeError::from))
        }
        .instrument(span)
        .await
    }

    pub async fn withdraw(&self, staker: &AccountId, amount: u128) -> Result<(), NodeError> {
        let span = operation_span("withdraw", staker);
        async {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            let PoolState {
                stake_token, engine, ..
            } = &mut *state;
            let result = engine.withdraw(stake_token, staker, amount, now);
            self.finish("withdraw", &state, result.map_err(NodeError::from))
        }
        .instrument(span)
        .await
    }

    /// Claim rewards. Returns the raw units paid.
    pub async fn get_reward(&self, staker: &AccountId) -> Result<u128, NodeError> {
        let span = operation_span("get_reward", staker);
        async {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            let PoolState {
                reward_token,
                engine,
                ..
            } = &mut *state;
            let result = engine.get_reward(reward_token, staker, now);
            if let Ok(paid) = result {
                self.metrics.rewards_paid.inc_by(paid as f64);
            }
            self.finish("get_reward", &state, result.map_err(NodeError::from))
        }
        .instrument(span)
        .await
    }

    /// Withdraw everything and claim. Returns `(withdrawn, paid)`.
    pub async fn exit(&self, staker: &AccountId) -> Result<(u128, u128), NodeError> {
        let span = operation_span("exit", staker);
        async {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            let PoolState {
                reward_token,
                stake_token,
                engine,
            } = &mut *state;
            let result = engine.exit(stake_token, reward_token, staker, now);
            if let Ok((_, paid)) = result {
                self.metrics.rewards_paid.inc_by(paid as f64);
            }
            self.finish("exit", &state, result.map_err(NodeError::from))
        }
        .instrument(span)
        .await
    }

    /// Start a distribution of `amount` already deposited in custody.
    /// Returns the new reward rate in raw units per second.
    pub async fn start_distribution(
        &self,
        caller: &AccountId,
        amount: u128,
    ) -> Result<u128, NodeError> {
        let span = operation_span("start_distribution", caller);
        async {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            let PoolState {
                reward_token,
                engine,
                ..
            } = &mut *state;
            let result = engine.start_distribution(&*reward_token, caller, amount, now);
            self.finish("start_distribution", &state, result.map_err(NodeError::from))
        }
        .instrument(span)
        .await
    }

    /// Start a distribution with every unallocated reward in custody.
    pub async fn start_distribution_from_balance(
        &self,
        caller: &AccountId,
    ) -> Result<u128, NodeError> {
        let span = operation_span("start_distribution_from_balance", caller);
        async {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            let PoolState {
                reward_token,
                engine,
                ..
            } = &mut *state;
            let result = engine.start_distribution_from_balance(&*reward_token, caller, now);
            self.finish(
                "start_distribution_from_balance",
                &state,
                result.map_err(NodeError::from),
            )
        }
        .instrument(span)
        .await
    }

    // ── Views ──────────────────────────────────────────────────────────

    pub async fn staker_view(&self, account: &AccountId) -> Result<StakerView, NodeError> {
        let state = self.state.lock().await;
        let now = self.clock.now();
        Ok(StakerView {
            account: account.clone(),
            now,
            reward_balance: state.reward_token.balance_of(account),
            stake_balance: state.stake_token.balance_of(account),
            staked: state.engine.staked_balance_of(account),
            earned: state.engine.earned(&state.reward_token, account, now)?,
        })
    }

    pub async fn pool_view(&self) -> Result<PoolView, NodeError> {
        let state = self.state.lock().await;
        let now = self.clock.now();
        let engine = &state.engine;
        let reward = &state.reward_token;
        Ok(PoolView {
            now,
            phase: engine.phase(now),
            period_finish: engine.period_finish(),
            reward_rate: engine.reward_rate(reward),
            reward_per_share: engine.reward_per_share(reward, now)?,
            reward_for_duration: engine.reward_for_duration(reward),
            unallocated_rewards: engine.unallocated_rewards(reward, now)?,
            total_staked: engine.total_staked(),
            stakers: engine.staker_count(),
            reward_supply: reward.total_supply(),
            reward_epoch: reward.epoch(),
        })
    }

    // ── Bookkeeping ────────────────────────────────────────────────────

    /// Count the outcome, refresh gauges, and log rejections.
    fn finish<T>(
        &self,
        operation: &str,
        state: &PoolState,
        result: Result<T, NodeError>,
    ) -> Result<T, NodeError> {
        match &result {
            Ok(_) => {
                self.metrics
                    .operations_applied
                    .with_label_values(&[operation])
                    .inc();
                self.update_gauges(state);
            }
            Err(e) => {
                self.metrics
                    .operations_rejected
                    .with_label_values(&[operation])
                    .inc();
                tracing::warn!(operation, error = %e, "operation rejected");
            }
        }
        result
    }

    fn update_gauges(&self, state: &PoolState) {
        self.metrics
            .total_staked
            .set(state.engine.total_staked() as f64);
        self.metrics
            .reward_supply
            .set(state.reward_token.total_supply() as f64);
        self.metrics
            .reward_epoch
            .set(i64::try_from(state.reward_token.epoch()).unwrap_or(i64::MAX));
    }
}
