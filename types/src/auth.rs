//! Access control for privileged operations.
//!
//! Ownership and role management live outside the engine. The ledger and the
//! reward engine only ask an [`AccessGate`] whether a caller may perform a
//! given [`Operation`] and refuse with `Unauthorized` otherwise.

use crate::address::AccountId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The operations guarded by an access gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Expand or contract the elastic token's total supply.
    Rebase,
    /// Start (or top up) a reward distribution window.
    StartDistribution,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rebase => "rebase",
            Self::StartDistribution => "start_distribution",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicate deciding whether `caller` may perform `operation`.
pub trait AccessGate: Send + Sync {
    fn is_authorized(&self, caller: &AccountId, operation: Operation) -> bool;
}

/// Single-owner gate: the owner may perform every privileged operation,
/// nobody else may perform any.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerGate {
    pub owner: AccountId,
}

impl OwnerGate {
    pub fn new(owner: AccountId) -> Self {
        Self { owner }
    }
}

impl AccessGate for OwnerGate {
    fn is_authorized(&self, caller: &AccountId, _operation: Operation) -> bool {
        *caller == self.owner
    }
}
