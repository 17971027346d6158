//! The elastic-supply ledger.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::LedgerError;
use crate::scaling::ScalingFactor;
use crate::token::{ElasticToken, FungibleToken};
use rebase_types::{AccessGate, AccountId, LedgerParams, Operation};
use serde::{Deserialize, Serialize};

/// An elastic-supply token ledger.
///
/// Accounts hold shares only. `total_shares` never changes after genesis;
/// `rebase` rewrites the scaling factor and nothing else, so it is O(1).
/// Invariant: the sum of all account shares equals `total_shares`.
pub struct ElasticLedger {
    name: String,
    symbol: String,
    decimals: u8,
    /// Shares per account. Zero-share entries are kept.
    accounts: HashMap<AccountId, u128>,
    total_shares: u128,
    /// `total_supply / total_shares`.
    factor: ScalingFactor,
    gate: Arc<dyn AccessGate>,
}

/// Serializable image of a ledger, without its access gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub accounts: BTreeMap<AccountId, u128>,
    pub total_shares: u128,
    pub factor: ScalingFactor,
}

impl ElasticLedger {
    /// Create a ledger and mint the initial supply to `owner`.
    pub fn genesis(
        params: &LedgerParams,
        owner: AccountId,
        gate: Arc<dyn AccessGate>,
    ) -> Result<Self, LedgerError> {
        let supply = params.initial_supply().ok_or(LedgerError::Overflow)?;
        let shares = params.initial_shares().ok_or(LedgerError::Overflow)?;
        let mut accounts = HashMap::new();
        accounts.insert(owner.clone(), shares);
        tracing::info!(
            symbol = %params.symbol,
            %owner,
            supply,
            shares,
            "elastic ledger created"
        );
        Ok(Self {
            name: params.name.clone(),
            symbol: params.symbol.clone(),
            decimals: params.decimals,
            accounts,
            total_shares: shares,
            factor: ScalingFactor::new(supply, shares, 0),
            gate,
        })
    }

    /// Restore a ledger from a snapshot, checking the share-sum invariant.
    pub fn from_snapshot(
        snapshot: LedgerSnapshot,
        gate: Arc<dyn AccessGate>,
    ) -> Result<Self, LedgerError> {
        let mut sum: u128 = 0;
        for shares in snapshot.accounts.values() {
            sum = sum.checked_add(*shares).ok_or(LedgerError::Overflow)?;
        }
        if sum != snapshot.total_shares {
            return Err(LedgerError::InvalidSnapshot(format!(
                "account shares sum to {sum}, total_shares is {}",
                snapshot.total_shares
            )));
        }
        if snapshot.factor.denominator != snapshot.total_shares {
            return Err(LedgerError::InvalidSnapshot(format!(
                "scaling factor denominator {} does not match total_shares {}",
                snapshot.factor.denominator, snapshot.total_shares
            )));
        }
        Ok(Self {
            name: snapshot.name,
            symbol: snapshot.symbol,
            decimals: snapshot.decimals,
            accounts: snapshot.accounts.into_iter().collect(),
            total_shares: snapshot.total_shares,
            factor: snapshot.factor,
            gate,
        })
    }

    /// Capture the full ledger state.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            decimals: self.decimals,
            accounts: self
                .accounts
                .iter()
                .map(|(id, shares)| (id.clone(), *shares))
                .collect(),
            total_shares: self.total_shares,
            factor: self.factor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Total issuance in external units.
    pub fn total_supply(&self) -> u128 {
        self.factor.numerator
    }

    /// Total shares; constant across rebases.
    pub fn total_shares(&self) -> u128 {
        self.total_shares
    }

    /// Number of rebases applied so far.
    pub fn epoch(&self) -> u64 {
        self.factor.epoch
    }

    /// Number of accounts ever credited.
    pub fn holder_count(&self) -> usize {
        self.accounts.len()
    }

    /// Every account with its current balance, in no particular order.
    pub fn balances(&self) -> impl Iterator<Item = (&AccountId, u128)> + '_ {
        self.accounts
            .iter()
            .map(|(id, shares)| (id, self.factor.to_balance(*shares)))
    }

    /// Move `amount` external units from `from` to `to`.
    ///
    /// The amount is converted to shares at the current factor, rounding
    /// down, so the recipient never receives more than was debited. Returns
    /// the number of shares moved.
    pub fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<u128, LedgerError> {
        let available = FungibleToken::balance_of(self, from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        let shares = self.factor.to_shares(amount).ok_or(LedgerError::Overflow)?;
        self.move_shares(from, to, shares)?;
        tracing::debug!(%from, %to, amount, shares, "transfer");
        Ok(shares)
    }

    /// Expand (`delta > 0`) or contract (`delta < 0`) total supply.
    ///
    /// Only the scaling factor changes; every balance moves proportionally.
    /// Returns the new total supply.
    pub fn rebase(&mut self, caller: &AccountId, delta: i128) -> Result<u128, LedgerError> {
        if !self.gate.is_authorized(caller, Operation::Rebase) {
            return Err(LedgerError::Unauthorized {
                caller: caller.clone(),
                operation: Operation::Rebase,
            });
        }
        let supply = self.total_supply();
        let invalid = || LedgerError::InvalidRebase { supply, delta };
        if self.total_shares == 0 {
            return Err(invalid());
        }
        let new_supply = if delta >= 0 {
            supply
                .checked_add(delta.unsigned_abs())
                .ok_or(LedgerError::Overflow)?
        } else {
            supply.checked_sub(delta.unsigned_abs()).ok_or_else(invalid)?
        };
        let epoch = self.factor.epoch.checked_add(1).ok_or(LedgerError::Overflow)?;
        self.factor = ScalingFactor::new(new_supply, self.total_shares, epoch);
        tracing::info!(
            symbol = %self.symbol,
            %caller,
            delta,
            supply = new_supply,
            epoch,
            "rebase applied"
        );
        Ok(new_supply)
    }

    fn move_shares(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        shares: u128,
    ) -> Result<(), LedgerError> {
        let available = self.accounts.get(from).copied().unwrap_or(0);
        if available < shares {
            return Err(LedgerError::InsufficientShares {
                needed: shares,
                available,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .accounts
            .get(to)
            .copied()
            .unwrap_or(0)
            .checked_add(shares)
            .ok_or(LedgerError::Overflow)?;
        self.accounts.insert(from.clone(), available - shares);
        self.accounts.insert(to.clone(), credited);
        Ok(())
    }
}

impl FungibleToken for ElasticLedger {
    fn balance_of(&self, account: &AccountId) -> u128 {
        self.factor.to_balance(self.shares_of(account))
    }

    fn transfer_from(
        &mut self,
        payer: &AccountId,
        payee: &AccountId,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.transfer(payer, payee, amount).map(|_| ())
    }
}

impl ElasticToken for ElasticLedger {
    fn scaling_factor(&self) -> ScalingFactor {
        self.factor
    }

    fn shares_of(&self, account: &AccountId) -> u128 {
        self.accounts.get(account).copied().unwrap_or(0)
    }

    fn transfer_shares(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        shares: u128,
    ) -> Result<(), LedgerError> {
        self.move_shares(from, to, shares)?;
        tracing::debug!(%from, %to, shares, "share transfer");
        Ok(())
    }
}

impl fmt::Debug for ElasticLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElasticLedger")
            .field("symbol", &self.symbol)
            .field("total_supply", &self.total_supply())
            .field("total_shares", &self.total_shares)
            .field("epoch", &self.factor.epoch)
            .field("holders", &self.accounts.len())
            .finish()
    }
}
