//! Staking pool node: the elastic reward token, the stake token and the
//! reward accrual engine behind a single serialization point.
//!
//! The node is the coordinator that:
//! - Serializes every mutation through one async lock
//! - Reads the clock inside that lock so timestamps follow operation order
//! - Persists and restores pool state as bincode snapshots
//! - Records Prometheus metrics and structured tracing for every operation

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod tracing_spans;

pub use config::NodeConfig;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::{NodeSnapshot, PoolState, PoolView, StakerView, StakingNode, TokenKind};
