//! Nullable infrastructure for deterministic testing.
//!
//! The engine's external collaborators (the clock and the access gate) are
//! traits in `rebase-types`. This crate provides implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the system clock
//!
//! Usage: swap real implementations for nullables in tests and scripted runs.

pub mod clock;
pub mod gate;

pub use clock::NullClock;
pub use gate::NullGate;
