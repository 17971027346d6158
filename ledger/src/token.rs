//! Token interfaces consumed by the reward engine.
//!
//! The engine is written against these traits rather than against
//! [`ElasticLedger`](crate::ElasticLedger) directly: the stake token is an
//! opaque fungible token (typically a liquidity-pair token), while the reward
//! token must expose its shares so rewards can be tracked rebase-invariantly.

use crate::error::LedgerError;
use crate::scaling::ScalingFactor;
use rebase_types::AccountId;

/// A fungible balance ledger.
pub trait FungibleToken {
    /// Current balance of `account` in external units.
    fn balance_of(&self, account: &AccountId) -> u128;

    /// Move `amount` external units from `payer` to `payee`.
    ///
    /// Fails with [`LedgerError::InsufficientBalance`] and no side effect when
    /// the payer cannot cover the amount.
    fn transfer_from(
        &mut self,
        payer: &AccountId,
        payee: &AccountId,
        amount: u128,
    ) -> Result<(), LedgerError>;
}

/// A fungible token whose balances are shares scaled by a global factor.
pub trait ElasticToken: FungibleToken {
    /// The current scaling factor; valid until the next rebase.
    fn scaling_factor(&self) -> ScalingFactor;

    /// Rebase-invariant share count held by `account`.
    fn shares_of(&self, account: &AccountId) -> u128;

    /// Move an exact number of shares from `from` to `to`.
    fn transfer_shares(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        shares: u128,
    ) -> Result<(), LedgerError>;
}
