//! Prometheus metrics for the staking node.
//!
//! The [`NodeMetrics`] struct owns a dedicated [`Registry`]; callers render
//! it with [`NodeMetrics::encode`] in the Prometheus text exposition format.
//! Token quantities routinely exceed 64 bits of raw units, so they are
//! tracked in float gauges and counters.

use prometheus::{
    register_counter_with_registry, register_gauge_with_registry,
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Counter, Encoder, Gauge, IntCounter, IntCounterVec,
    IntGauge, Opts, Registry, TextEncoder,
};

/// Central collection of all node-level Prometheus metrics.
pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Operations that completed, labelled by operation name.
    pub operations_applied: IntCounterVec,
    /// Operations rejected with an error, labelled by operation name.
    pub operations_rejected: IntCounterVec,
    /// Rebases applied to the reward token.
    pub rebases: IntCounter,
    /// Reward-token raw units paid to stakers, at the rate current when paid.
    pub rewards_paid: Counter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Stake-token raw units held by the pool.
    pub total_staked: Gauge,
    /// Reward-token total supply in raw units.
    pub reward_supply: Gauge,
    /// Current rebase epoch of the reward token.
    pub reward_epoch: IntGauge,
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Counters
        let operations_applied = register_int_counter_vec_with_registry!(
            Opts::new(
                "rebase_operations_applied_total",
                "Operations applied by this node"
            ),
            &["operation"],
            registry
        )?;

        let operations_rejected = register_int_counter_vec_with_registry!(
            Opts::new(
                "rebase_operations_rejected_total",
                "Operations rejected by this node"
            ),
            &["operation"],
            registry
        )?;

        let rebases = register_int_counter_with_registry!(
            Opts::new("rebase_rebases_total", "Rebases applied to the reward token"),
            registry
        )?;

        let rewards_paid = register_counter_with_registry!(
            Opts::new(
                "rebase_rewards_paid_total",
                "Reward-token raw units paid to stakers"
            ),
            registry
        )?;

        // Gauges
        let total_staked = register_gauge_with_registry!(
            Opts::new("rebase_total_staked", "Stake-token raw units held by the pool"),
            registry
        )?;

        let reward_supply = register_gauge_with_registry!(
            Opts::new("rebase_reward_supply", "Reward-token total supply in raw units"),
            registry
        )?;

        let reward_epoch = register_int_gauge_with_registry!(
            Opts::new("rebase_reward_epoch", "Rebase epoch of the reward token"),
            registry
        )?;

        Ok(Self {
            registry,
            operations_applied,
            operations_rejected,
            rebases,
            rewards_paid,
            total_staked,
            reward_supply,
            reward_epoch,
        })
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_metrics() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.operations_applied.with_label_values(&["stake"]).inc();
        metrics.rebases.inc();
        metrics.reward_supply.set(1e20);

        let text = metrics.encode().unwrap();
        assert!(text.contains("rebase_operations_applied_total{operation=\"stake\"} 1"));
        assert!(text.contains("rebase_rebases_total 1"));
        assert!(text.contains("rebase_reward_supply"));
    }

    #[test]
    fn registries_are_independent() {
        let a = NodeMetrics::new().unwrap();
        let b = NodeMetrics::new().unwrap();
        a.rebases.inc();
        assert_eq!(b.rebases.get(), 0);
    }
}
