//! Fundamental types for the rebase staking engine.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! account identifiers, timestamps and the clock abstraction, the access gate
//! guarding privileged operations, and the tunable ledger/reward parameters.

pub mod address;
pub mod auth;
pub mod params;
pub mod time;

pub use address::AccountId;
pub use auth::{AccessGate, Operation, OwnerGate};
pub use params::{LedgerParams, RewardParams};
pub use time::{Clock, SystemClock, Timestamp};
