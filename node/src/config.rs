//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use rebase_types::{AccountId, LedgerParams, RewardParams};

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for a staking node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Account that receives both genesis supplies and holds every
    /// privileged role (rebase, start distribution).
    #[serde(default = "default_owner")]
    pub owner: AccountId,

    /// Custody account of the staking pool.
    #[serde(default = "default_pool_account")]
    pub pool_account: AccountId,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Where pool state is restored from and saved to, if anywhere.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    /// The elastic reward token.
    #[serde(default = "LedgerParams::rebase_defaults")]
    pub reward_token: LedgerParams,

    /// The stake token (never rebased by the node).
    #[serde(default = "LedgerParams::stake_token_defaults")]
    pub stake_token: LedgerParams,

    #[serde(default)]
    pub rewards: RewardParams,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_owner() -> AccountId {
    AccountId::from("owner")
}

fn default_pool_account() -> AccountId {
    AccountId::from("staking-pool")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// The parsed log format.
    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }

    /// Reject configurations the ledgers or the engine cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        for (label, id) in [("owner", &self.owner), ("pool_account", &self.pool_account)] {
            if !id.is_valid() {
                return Err(NodeError::Config(format!("{label} account id is invalid")));
            }
        }
        if self.owner == self.pool_account {
            return Err(NodeError::Config(
                "pool_account must differ from owner".to_string(),
            ));
        }
        for (label, params) in [
            ("reward_token", &self.reward_token),
            ("stake_token", &self.stake_token),
        ] {
            if params.initial_shares().is_none() {
                return Err(NodeError::Config(format!(
                    "{label}: initial supply overflows 128 bits"
                )));
            }
        }
        if self.rewards.rewards_duration_secs == 0 {
            return Err(NodeError::Config(
                "rewards.rewards_duration_secs must be positive".to_string(),
            ));
        }
        self.log_format()?;
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            pool_account: default_pool_account(),
            reward_token: LedgerParams::rebase_defaults(),
            stake_token: LedgerParams::stake_token_defaults(),
            rewards: RewardParams::default(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            snapshot_path: None,
        }
    }
}
