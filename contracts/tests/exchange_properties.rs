// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Property tests for the exchange: conservation of the reserve, exact
//! conversions, and the deposit/redeem round trip.

use ethx_contracts::{ExchangeError, ExchangeHost};
use ethx_protocol::config::{DeploymentConfig, GenesisAccount};
use ethx_protocol::{Address, Wad, WAD};
use proptest::prelude::*;

const FUNDING: u128 = 1_000_000 * WAD;

fn host_with_rate(rate: Wad) -> (ExchangeHost, Address, Address) {
    let owner = Address::from_label("owner");
    let user = Address::from_label("user");
    let config = DeploymentConfig {
        deployer: owner,
        initial_rate: rate,
        token_name: "Testing Token".into(),
        token_symbol: "lz404".into(),
    };
    let genesis = vec![
        GenesisAccount {
            address: owner,
            balance: Wad::from_base_units(FUNDING),
        },
        GenesisAccount {
            address: user,
            balance: Wad::from_base_units(FUNDING),
        },
    ];
    (ExchangeHost::deploy(&config, &genesis).unwrap(), owner, user)
}

#[derive(Debug, Clone)]
enum Op {
    Deposit(u128),
    Redeem(u128),
    Withdraw(u128),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u128..=10 * WAD).prop_map(Op::Deposit),
        (1u128..=10_000 * WAD).prop_map(Op::Redeem),
        (1u128..=5 * WAD).prop_map(Op::Withdraw),
    ]
}

proptest! {
    #[test]
    fn reserve_is_conserved(
        whole_rate in 1u128..=5000,
        ops in proptest::collection::vec(op(), 1..40),
    ) {
        let (mut host, owner, user) = host_with_rate(Wad::from_base_units(whole_rate * WAD));
        let mut deposited = 0u128;
        let mut paid_out = 0u128;
        let mut withdrawn = 0u128;

        for op in ops {
            match op {
                Op::Deposit(amount) => {
                    if host.receive(user, Wad::from_base_units(amount)).is_ok() {
                        deposited += amount;
                    }
                }
                Op::Redeem(credits) => {
                    let credits = Wad::from_base_units(credits);
                    host.approve(user, credits).unwrap();
                    if let Ok(payout) = host.redeem(user, credits) {
                        paid_out += payout.base_units();
                    }
                }
                Op::Withdraw(amount) => {
                    if host.emergency_withdraw(owner, Wad::from_base_units(amount)).is_ok() {
                        withdrawn += amount;
                    }
                }
            }
            prop_assert_eq!(host.reserve().base_units(), deposited - paid_out - withdrawn);
            prop_assert_eq!(host.ledger().balances_sum(), Some(host.total_credit_supply()));
        }
    }

    #[test]
    fn deposit_mints_exact_product(
        whole_rate in 1u128..=100_000,
        amount in 1u128..=1000 * WAD,
    ) {
        let (mut host, _, user) = host_with_rate(Wad::from_base_units(whole_rate * WAD));
        let credits = host.receive(user, Wad::from_base_units(amount)).unwrap();
        prop_assert_eq!(credits.base_units(), amount * whole_rate);
    }

    #[test]
    fn whole_rate_round_trip_is_exact(
        whole_rate in 1u128..=100_000,
        amount in 1u128..=1000 * WAD,
    ) {
        let (mut host, _, user) = host_with_rate(Wad::from_base_units(whole_rate * WAD));
        let reserve_before = host.reserve();
        let native_before = host.native_balance(&user);

        let credits = host.receive(user, Wad::from_base_units(amount)).unwrap();
        host.approve(user, credits).unwrap();
        let payout = host.redeem(user, credits).unwrap();

        prop_assert_eq!(payout.base_units(), amount);
        prop_assert_eq!(host.reserve(), reserve_before);
        prop_assert_eq!(host.native_balance(&user), native_before);
        prop_assert_eq!(host.total_credit_supply(), Wad::ZERO);
    }

    #[test]
    fn fractional_rate_round_trip_never_overpays(
        rate_units in 1u128..=10_000 * WAD,
        amount in 1u128..=1000 * WAD,
    ) {
        let (mut host, _, user) = host_with_rate(Wad::from_base_units(rate_units));
        let credits = host.receive(user, Wad::from_base_units(amount)).unwrap();
        if credits.is_zero() {
            return Ok(());
        }
        host.approve(user, credits).unwrap();
        let payout = host.redeem(user, credits).unwrap();
        prop_assert!(payout.base_units() <= amount);
        prop_assert_eq!(host.reserve().base_units(), amount - payout.base_units());
    }

    #[test]
    fn oversized_redemption_changes_nothing(
        whole_rate in 1u128..=5000,
        amount in 1u128..=10 * WAD,
        extra in 1u128..=1000 * WAD,
    ) {
        let (mut host, _, user) = host_with_rate(Wad::from_base_units(whole_rate * WAD));
        let credits = host.receive(user, Wad::from_base_units(amount)).unwrap();
        let ask = Wad::from_base_units(credits.base_units() + extra * whole_rate);
        host.approve(user, ask).unwrap();
        let before = host.clone();

        let result = host.redeem(user, ask);
        let rejected_for_reserve = matches!(result, Err(ExchangeError::InsufficientReserve { .. }));
        prop_assert!(rejected_for_reserve);
        prop_assert_eq!(host, before);
    }

    #[test]
    fn non_owner_never_mutates(
        new_rate in 1u128..=u64::MAX as u128,
        use_holder in any::<bool>(),
    ) {
        let (mut host, owner, user) = host_with_rate(Wad::from_base_units(1000 * WAD));
        host.receive(user, Wad::from_base_units(WAD)).unwrap();
        let caller = if use_holder { user } else { Address::random() };
        prop_assume!(caller != owner);
        let before = host.clone();

        let rate_result = host.set_exchange_rate(caller, Wad::from_base_units(new_rate));
        let rate_rejected = matches!(rate_result, Err(ExchangeError::Unauthorized { .. }));
        prop_assert!(rate_rejected);
        let withdraw_result = host.emergency_withdraw(caller, Wad::from_base_units(1));
        let withdraw_rejected = matches!(withdraw_result, Err(ExchangeError::Unauthorized { .. }));
        prop_assert!(withdraw_rejected);
        prop_assert_eq!(host, before);
    }
}
