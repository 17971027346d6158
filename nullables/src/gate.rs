//! Nullable access gate.

use rebase_types::{AccessGate, AccountId, Operation};

/// A gate that answers the same for every caller and operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NullGate {
    allow: bool,
}

impl NullGate {
    pub fn allow_all() -> Self {
        Self { allow: true }
    }

    pub fn deny_all() -> Self {
        Self { allow: false }
    }
}

impl AccessGate for NullGate {
    fn is_authorized(&self, _caller: &AccountId, _operation: Operation) -> bool {
        self.allow
    }
}
