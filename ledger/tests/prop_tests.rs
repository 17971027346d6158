use std::sync::Arc;

use proptest::prelude::*;

use rebase_ledger::{ElasticLedger, ElasticToken, FungibleToken};
use rebase_types::{AccountId, LedgerParams, OwnerGate};

const E18: u128 = 1_000_000_000_000_000_000;

fn owner() -> AccountId {
    AccountId::from("owner")
}

fn ledger_with_holders(amounts: &[u128]) -> (ElasticLedger, Vec<AccountId>) {
    let mut ledger = ElasticLedger::genesis(
        &LedgerParams::default(),
        owner(),
        Arc::new(OwnerGate::new(owner())),
    )
    .unwrap();
    let mut holders = vec![owner()];
    for (i, amount) in amounts.iter().enumerate() {
        let id = AccountId::new(format!("holder-{i}"));
        ledger.transfer(&owner(), &id, *amount).unwrap();
        holders.push(id);
    }
    (ledger, holders)
}

proptest! {
    /// Balances never sum above the supply, and lose at most one unit per holder.
    #[test]
    fn balances_track_total_supply(
        amounts in prop::collection::vec(1u128..E18, 1..8),
        deltas in prop::collection::vec(-(E18 as i128)..(10 * E18 as i128), 0..6),
    ) {
        let (mut ledger, holders) = ledger_with_holders(&amounts);
        for delta in deltas {
            ledger.rebase(&owner(), delta).unwrap();
            let sum: u128 = holders.iter().map(|h| ledger.balance_of(h)).sum();
            let supply = ledger.total_supply();
            prop_assert!(sum <= supply, "sum {} > supply {}", sum, supply);
            prop_assert!(supply - sum <= ledger.holder_count() as u128,
                "rounding loss {} exceeds holder count", supply - sum);
        }
    }

    /// A positive rebase never lowers, and a negative one never raises, any
    /// balance. Holders whose proportional change is at least one raw unit
    /// (`balance * |delta| >= supply`) move strictly.
    #[test]
    fn rebase_moves_balances_in_its_direction(
        amounts in prop::collection::vec(1u128..E18, 1..6),
        delta in -(50 * E18 as i128)..(50 * E18 as i128),
    ) {
        let (mut ledger, holders) = ledger_with_holders(&amounts);
        let supply = ledger.total_supply();
        let before: Vec<u128> = holders.iter().map(|h| ledger.balance_of(h)).collect();
        ledger.rebase(&owner(), delta).unwrap();
        for (h, b) in holders.iter().zip(before) {
            let after = ledger.balance_of(h);
            let moves_a_unit = b
                .checked_mul(delta.unsigned_abs())
                .map_or(true, |change| change >= supply);
            if delta >= 0 {
                prop_assert!(after >= b);
                if moves_a_unit {
                    prop_assert!(after > b, "{} did not grow from {}", h, b);
                }
            } else {
                prop_assert!(after <= b);
                if moves_a_unit {
                    prop_assert!(after < b, "{} did not shrink from {}", h, b);
                }
            }
        }
    }

    /// The smallest holder still moves strictly once the rebase is large
    /// enough to shift it by a whole unit.
    #[test]
    fn rebase_strictly_moves_every_holder(
        amounts in prop::collection::vec(1_000u128..E18, 1..6),
        grow in any::<bool>(),
    ) {
        let (mut ledger, holders) = ledger_with_holders(&amounts);
        let supply = ledger.total_supply();
        let smallest = holders.iter().map(|h| ledger.balance_of(h)).min().unwrap();
        // `smallest * magnitude >= supply` for every holder.
        let magnitude = supply.div_ceil(smallest).min(supply / 2);
        prop_assume!(smallest.checked_mul(magnitude).map_or(true, |c| c >= supply));
        let delta = if grow { magnitude as i128 } else { -(magnitude as i128) };

        let before: Vec<u128> = holders.iter().map(|h| ledger.balance_of(h)).collect();
        ledger.rebase(&owner(), delta).unwrap();
        for (h, b) in holders.iter().zip(before) {
            let after = ledger.balance_of(h);
            if grow {
                prop_assert!(after > b);
            } else {
                prop_assert!(after < b);
            }
        }
    }

    /// Transfers conserve shares and never credit more than was requested.
    #[test]
    fn transfer_conserves_shares(
        amount in 1u128..(50 * E18),
        delta in -(50 * E18 as i128)..(50 * E18 as i128),
    ) {
        let (mut ledger, holders) = ledger_with_holders(&[]);
        ledger.rebase(&owner(), delta).unwrap();
        let alice = AccountId::from("alice");
        let total_before = ledger.total_shares();

        ledger.transfer(&holders[0], &alice, amount).unwrap();
        prop_assert!(ledger.balance_of(&alice) <= amount);
        prop_assert_eq!(
            ledger.shares_of(&holders[0]) + ledger.shares_of(&alice),
            total_before
        );
        prop_assert_eq!(ledger.total_shares(), total_before);
    }
}
