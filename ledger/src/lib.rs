//! Elastic-supply token ledger.
//!
//! Holders own *shares*; balances are never stored. Every balance is derived
//! at read time as `shares * scaling_factor`, where the scaling factor is the
//! rational `total_supply / total_shares`. A rebase rewrites only that factor,
//! so expanding or contracting supply is O(1) regardless of holder count and
//! preserves every holder's proportional ownership.
//!
//! This crate also defines the token traits the reward engine consumes:
//! [`FungibleToken`] for plain balance transfers and [`ElasticToken`] for
//! share-level access to a rebasing token.

pub mod error;
pub mod ledger;
pub mod math;
pub mod scaling;
pub mod token;

pub use error::LedgerError;
pub use ledger::{ElasticLedger, LedgerSnapshot};
pub use math::{mul_div, mul_div_wide, u256_dec, U256};
pub use scaling::ScalingFactor;
pub use token::{ElasticToken, FungibleToken};
