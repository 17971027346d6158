//! Scenario scripts: a TOML list of steps replayed against a node.
//!
//! ```toml
//! start_time = 0
//!
//! [[steps]]
//! action = "transfer"
//! token = "reward"
//! from = "owner"
//! to = "staking-pool"
//! amount = 50000000000
//!
//! [[steps]]
//! action = "rebase"
//! delta = "-1.5"        # strings are whole tokens, integers raw units
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use rebase_node::{NodeError, StakingNode, TokenKind};
use rebase_node::tracing_spans::scenario_step_span;
use rebase_nullables::NullClock;
use rebase_types::AccountId;
use rebase_utils::{format_amount, format_duration, parse_amount};
use serde::Deserialize;
use tracing::Instrument;

/// A token quantity: an integer in raw units or a decimal string in whole
/// tokens (TOML integers stop at 63 bits).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Raw(u64),
    Tokens(String),
}

impl Amount {
    pub fn resolve(&self, decimals: u8) -> anyhow::Result<u128> {
        match self {
            Self::Raw(raw) => Ok(u128::from(*raw)),
            Self::Tokens(s) => Ok(parse_amount(s, decimals)?),
        }
    }
}

/// A signed token quantity for rebases.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SignedAmount {
    Raw(i64),
    Tokens(String),
}

impl SignedAmount {
    pub fn resolve(&self, decimals: u8) -> anyhow::Result<i128> {
        match self {
            Self::Raw(raw) => Ok(i128::from(*raw)),
            Self::Tokens(s) => {
                let (negative, digits) = match s.trim().strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, s.trim()),
                };
                let magnitude = i128::try_from(parse_amount(digits, decimals)?)
                    .context("rebase delta does not fit in 127 bits")?;
                Ok(if negative { -magnitude } else { magnitude })
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Transfer {
        token: TokenKind,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },
    Rebase {
        #[serde(default)]
        caller: Option<AccountId>,
        delta: SignedAmount,
    },
    Stake {
        staker: AccountId,
        amount: Amount,
    },
    Withdraw {
        staker: AccountId,
        amount: Amount,
    },
    GetReward {
        staker: AccountId,
    },
    Exit {
        staker: AccountId,
    },
    StartDistribution {
        #[serde(default)]
        caller: Option<AccountId>,
        amount: Amount,
    },
    StartDistributionFromBalance {
        #[serde(default)]
        caller: Option<AccountId>,
    },
    Advance {
        secs: u64,
    },
    Report {
        #[serde(default)]
        account: Option<AccountId>,
    },
}

impl Step {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "transfer",
            Self::Rebase { .. } => "rebase",
            Self::Stake { .. } => "stake",
            Self::Withdraw { .. } => "withdraw",
            Self::GetReward { .. } => "get_reward",
            Self::Exit { .. } => "exit",
            Self::StartDistribution { .. } => "start_distribution",
            Self::StartDistributionFromBalance { .. } => "start_distribution_from_balance",
            Self::Advance { .. } => "advance",
            Self::Report { .. } => "report",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Script {
    /// Clock reading before the first step.
    #[serde(default)]
    pub start_time: u64,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("invalid scenario script")
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}

/// Tally of a script run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub applied: usize,
    pub rejected: usize,
}

/// Replays scripts against one node, advancing its clock on `advance`.
pub struct ScriptRunner {
    node: Arc<StakingNode>,
    clock: Arc<NullClock>,
    /// Stop at the first rejected step instead of logging and moving on.
    strict: bool,
    /// Where `report` steps write their JSON lines.
    reports: Vec<String>,
}

impl ScriptRunner {
    pub fn new(node: Arc<StakingNode>, clock: Arc<NullClock>, strict: bool) -> Self {
        Self {
            node,
            clock,
            strict,
            reports: Vec::new(),
        }
    }

    /// JSON lines produced by `report` steps so far.
    pub fn reports(&self) -> &[String] {
        &self.reports
    }

    pub async fn run(&mut self, script: &Script) -> anyhow::Result<RunSummary> {
        self.clock.set(script.start_time);
        let mut summary = RunSummary::default();
        for (index, step) in script.steps.iter().enumerate() {
            let span = scenario_step_span(index, step.action());
            match self.apply(step).instrument(span).await {
                Ok(()) => summary.applied += 1,
                Err(StepError::Rejected(e)) if !self.strict => {
                    tracing::warn!(step = index, action = step.action(), error = %e, "step rejected");
                    summary.rejected += 1;
                }
                Err(StepError::Rejected(e)) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("step {index} ({}) rejected", step.action())));
                }
                Err(StepError::Script(e)) => {
                    return Err(e.context(format!("step {index} ({}) is malformed", step.action())));
                }
            }
        }
        tracing::info!(
            applied = summary.applied,
            rejected = summary.rejected,
            "scenario finished"
        );
        Ok(summary)
    }

    async fn apply(&mut self, step: &Step) -> Result<(), StepError> {
        let config = &self.node.config;
        let reward_decimals = config.reward_token.decimals;
        let stake_decimals = config.stake_token.decimals;
        let owner = || config.owner.clone();

        match step {
            Step::Transfer {
                token,
                from,
                to,
                amount,
            } => {
                let decimals = match token {
                    TokenKind::Reward => reward_decimals,
                    TokenKind::Stake => stake_decimals,
                };
                let amount = amount.resolve(decimals)?;
                self.node.transfer(*token, from, to, amount).await?;
            }
            Step::Rebase { caller, delta } => {
                let delta = delta.resolve(reward_decimals)?;
                let caller = caller.clone().unwrap_or_else(owner);
                let supply = self.node.rebase(&caller, delta).await?;
                tracing::info!(
                    supply = %format_amount(supply, reward_decimals),
                    "reward token rebased"
                );
            }
            Step::Stake { staker, amount } => {
                let amount = amount.resolve(stake_decimals)?;
                self.node.stake(staker, amount).await?;
            }
            Step::Withdraw { staker, amount } => {
                let amount = amount.resolve(stake_decimals)?;
                self.node.withdraw(staker, amount).await?;
            }
            Step::GetReward { staker } => {
                let paid = self.node.get_reward(staker).await?;
                tracing::info!(%staker, paid = %format_amount(paid, reward_decimals), "claimed");
            }
            Step::Exit { staker } => {
                let (withdrawn, paid) = self.node.exit(staker).await?;
                tracing::info!(
                    %staker,
                    withdrawn = %format_amount(withdrawn, stake_decimals),
                    paid = %format_amount(paid, reward_decimals),
                    "exited"
                );
            }
            Step::StartDistribution { caller, amount } => {
                let amount = amount.resolve(reward_decimals)?;
                let caller = caller.clone().unwrap_or_else(owner);
                let rate = self.node.start_distribution(&caller, amount).await?;
                tracing::info!(rate, "distribution started");
            }
            Step::StartDistributionFromBalance { caller } => {
                let caller = caller.clone().unwrap_or_else(owner);
                let rate = self.node.start_distribution_from_balance(&caller).await?;
                tracing::info!(rate, "distribution started from balance");
            }
            Step::Advance { secs } => {
                let now = self.clock.advance(*secs);
                tracing::info!(by = %format_duration(*secs), %now, "clock advanced");
            }
            Step::Report { account } => {
                let line = match account {
                    Some(account) => serde_json::to_string(&self.node.staker_view(account).await?),
                    None => serde_json::to_string(&self.node.pool_view().await?),
                }
                .map_err(|e| StepError::Script(e.into()))?;
                println!("{line}");
                self.reports.push(line);
            }
        }
        Ok(())
    }
}

/// Why a step did not apply: the node refused it, or the script is broken.
enum StepError {
    Rejected(NodeError),
    Script(anyhow::Error),
}

impl From<NodeError> for StepError {
    fn from(e: NodeError) -> Self {
        Self::Rejected(e)
    }
}

impl From<anyhow::Error> for StepError {
    fn from(e: anyhow::Error) -> Self {
        Self::Script(e)
    }
}
