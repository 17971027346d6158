//! Tunable parameters for the elastic ledger and the reward engine.
//!
//! Both structs are loaded from the node's TOML configuration; every field
//! has a default so a partial file is enough.

use serde::{Deserialize, Serialize};

/// Parameters of one elastic token ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerParams {
    /// Human-readable token name.
    #[serde(default = "default_name")]
    pub name: String,

    /// Ticker symbol.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Number of decimal places in one whole token.
    #[serde(default = "default_decimals")]
    pub decimals: u8,

    /// Initial supply in whole tokens, minted to the owner at genesis.
    /// The raw supply is `initial_supply_tokens * 10^decimals`.
    #[serde(default = "default_initial_supply_tokens")]
    pub initial_supply_tokens: u64,

    /// Internal shares backing each raw unit of the initial supply.
    /// Higher values keep sub-unit precision across contracting rebases.
    #[serde(default = "default_shares_per_unit")]
    pub shares_per_unit: u64,
}

impl LedgerParams {
    /// Default number of internal shares per raw unit at genesis.
    pub const SHARES_PER_UNIT: u64 = 1_000_000_000;

    /// Rebase token defaults: "REBASE"/"RB", 18 decimals, 100 tokens.
    pub fn rebase_defaults() -> Self {
        Self {
            name: default_name(),
            symbol: default_symbol(),
            decimals: default_decimals(),
            initial_supply_tokens: default_initial_supply_tokens(),
            shares_per_unit: default_shares_per_unit(),
        }
    }

    /// An opaque, never-rebased stake token (e.g. a liquidity-pair token).
    pub fn stake_token_defaults() -> Self {
        Self {
            name: "Liquidity Pair".to_string(),
            symbol: "LP".to_string(),
            decimals: 18,
            initial_supply_tokens: 1_000_000,
            shares_per_unit: 1,
        }
    }

    /// One whole token in raw units, `None` if `10^decimals` overflows.
    pub fn unit(&self) -> Option<u128> {
        10u128.checked_pow(u32::from(self.decimals))
    }

    /// Initial supply in raw units, `None` on overflow.
    pub fn initial_supply(&self) -> Option<u128> {
        self.unit()?.checked_mul(u128::from(self.initial_supply_tokens))
    }

    /// Initial total shares, `None` on overflow.
    pub fn initial_shares(&self) -> Option<u128> {
        self.initial_supply()?
            .checked_mul(u128::from(self.shares_per_unit.max(1)))
    }
}

impl Default for LedgerParams {
    fn default() -> Self {
        Self::rebase_defaults()
    }
}

/// Parameters of the reward distribution schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardParams {
    /// Length of every distribution window in seconds.
    #[serde(default = "default_rewards_duration_secs")]
    pub rewards_duration_secs: u64,
}

impl RewardParams {
    /// Eight weeks: 8 * 7 * 24 * 3600.
    pub const DEFAULT_REWARDS_DURATION_SECS: u64 = 4_838_400;
}

impl Default for RewardParams {
    fn default() -> Self {
        Self {
            rewards_duration_secs: default_rewards_duration_secs(),
        }
    }
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_name() -> String {
    "REBASE".to_string()
}

fn default_symbol() -> String {
    "RB".to_string()
}

fn default_decimals() -> u8 {
    18
}

fn default_initial_supply_tokens() -> u64 {
    100
}

fn default_shares_per_unit() -> u64 {
    LedgerParams::SHARES_PER_UNIT
}

fn default_rewards_duration_secs() -> u64 {
    RewardParams::DEFAULT_REWARDS_DURATION_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_supply_is_one_hundred_tokens() {
        let p = LedgerParams::default();
        assert_eq!(p.initial_supply(), Some(100_000_000_000_000_000_000));
        assert_eq!(
            p.initial_shares(),
            Some(100_000_000_000_000_000_000 * 1_000_000_000)
        );
    }

    #[test]
    fn default_duration_is_eight_weeks() {
        assert_eq!(RewardParams::default().rewards_duration_secs, 8 * 7 * 24 * 3600);
    }

    #[test]
    fn oversized_decimals_overflow_to_none() {
        let p = LedgerParams {
            decimals: 40,
            ..LedgerParams::default()
        };
        assert_eq!(p.unit(), None);
        assert_eq!(p.initial_supply(), None);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let p: LedgerParams = toml::from_str("symbol = \"XRB\"").unwrap();
        assert_eq!(p.symbol, "XRB");
        assert_eq!(p.name, "REBASE");
        assert_eq!(p.decimals, 18);

        let r: RewardParams = toml::from_str("").unwrap();
        assert_eq!(r.rewards_duration_secs, RewardParams::DEFAULT_REWARDS_DURATION_SECS);
    }
}
