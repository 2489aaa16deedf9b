// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Integration tests for the exchange.
//!
//! Drives a deployed [`ExchangeHost`] the way a client would: plain value
//! transfers for deposits, an approval followed by a redemption, and the
//! owner's rate and withdrawal controls.

use ethx_contracts::{ExchangeError, ExchangeEvent, ExchangeHost, LedgerError, LedgerEvent};
use ethx_protocol::config::{DeploymentConfig, GenesisAccount};
use ethx_protocol::{Address, Wad};

fn w(s: &str) -> Wad {
    Wad::parse(s).unwrap()
}

struct Accounts {
    owner: Address,
    addr1: Address,
    addr2: Address,
}

/// Helper: rate 1000, "Testing Token" / "lz404", three funded accounts.
fn deploy() -> (ExchangeHost, Accounts) {
    let accounts = Accounts {
        owner: Address::from_label("owner"),
        addr1: Address::from_label("addr1"),
        addr2: Address::from_label("addr2"),
    };
    let config = DeploymentConfig {
        deployer: accounts.owner,
        initial_rate: w("1000"),
        token_name: "Testing Token".into(),
        token_symbol: "lz404".into(),
    };
    let genesis: Vec<GenesisAccount> = [accounts.owner, accounts.addr1, accounts.addr2]
        .into_iter()
        .map(|address| GenesisAccount {
            address,
            balance: w("10000"),
        })
        .collect();
    let host = ExchangeHost::deploy(&config, &genesis).unwrap();
    (host, accounts)
}

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

#[test]
fn sets_the_right_owner() {
    let (host, a) = deploy();
    assert_eq!(host.engine().authority(), a.owner);
}

#[test]
fn sets_the_initial_rate() {
    let (host, _) = deploy();
    assert_eq!(host.rate(), w("1000"));
}

#[test]
fn has_a_token_contract() {
    let (host, _) = deploy();
    let ledger = host.ledger();
    assert!(!host.engine().ledger_address().is_zero());
    assert_eq!(ledger.name(), "Testing Token");
    assert_eq!(ledger.symbol(), "lz404");
    assert_eq!(ledger.decimals(), 18);
    assert_eq!(ledger.total_supply(), Wad::ZERO);
}

// ---------------------------------------------------------------------------
// ETH to Token
// ---------------------------------------------------------------------------

#[test]
fn issues_tokens_when_eth_is_sent() {
    let (mut host, a) = deploy();
    host.receive(a.addr1, w("1.0")).unwrap();
    assert_eq!(host.credit_balance(&a.addr1), w("1000"));
    assert_eq!(host.reserve(), w("1"));
}

#[test]
fn emits_eth_to_token() {
    let (mut host, a) = deploy();
    host.receive(a.addr1, w("0.5")).unwrap();
    assert_eq!(
        host.events().last().unwrap().event,
        ExchangeEvent::EthToToken {
            sender: a.addr1,
            amount_in: w("0.5"),
            credits_out: w("500.0"),
        }
    );
    let mint = &host.ledger().events().last().unwrap().event;
    assert_eq!(
        mint,
        &LedgerEvent::Transfer {
            from: Address::ZERO,
            to: a.addr1,
            amount: w("500"),
        }
    );
}

#[test]
fn engine_cannot_mint_against_its_own_reserve() {
    let (mut host, a) = deploy_with_deposit();
    let engine = host.engine().address();
    let mallory = Address::from_label("mallory");

    let err = host.receive(engine, w("1")).unwrap_err();
    assert_eq!(err, ExchangeError::SelfDeposit);
    assert_eq!(host.reserve(), w("1"));
    assert_eq!(host.total_credit_supply(), w("1000"));
    assert_eq!(host.credit_balance(&engine), Wad::ZERO);

    // With nothing minted to the engine there is nothing to pass on.
    assert!(host.transfer_credits(engine, mallory, w("1000")).is_err());
    host.approve(mallory, w("1000")).unwrap();
    assert!(host.redeem(mallory, w("1000")).is_err());
    assert_eq!(host.reserve(), w("1"));
    assert_eq!(host.credit_balance(&a.addr1), w("1000"));
}

#[test]
fn rejects_zero_eth() {
    let (mut host, a) = deploy();
    let err = host.receive(a.addr1, Wad::ZERO).unwrap_err();
    assert_eq!(err.to_string(), "Must send ETH to get tokens");
    assert_eq!(host.total_credit_supply(), Wad::ZERO);
    assert!(host.events().is_empty());
}

// ---------------------------------------------------------------------------
// Token to ETH
// ---------------------------------------------------------------------------

/// Helper: deployment where addr1 already sent 1 ETH.
fn deploy_with_deposit() -> (ExchangeHost, Accounts) {
    let (mut host, a) = deploy();
    host.receive(a.addr1, w("1.0")).unwrap();
    (host, a)
}

#[test]
fn exchanges_tokens_for_eth() {
    let (mut host, a) = deploy_with_deposit();
    let before = host.native_balance(&a.addr1);

    host.approve(a.addr1, w("500.0")).unwrap();
    let payout = host.redeem(a.addr1, w("500.0")).unwrap();

    assert_eq!(payout, w("0.5"));
    assert_eq!(host.credit_balance(&a.addr1), w("500.0"));
    assert_eq!(host.native_balance(&a.addr1), before.checked_add(w("0.5")).unwrap());
    assert_eq!(host.allowance(&a.addr1, &host.engine().address()), Wad::ZERO);
}

#[test]
fn emits_token_to_eth() {
    let (mut host, a) = deploy_with_deposit();
    host.approve(a.addr1, w("500.0")).unwrap();
    host.redeem(a.addr1, w("500.0")).unwrap();
    assert_eq!(
        host.events().last().unwrap().event,
        ExchangeEvent::TokenToEth {
            caller: a.addr1,
            credits_in: w("500.0"),
            amount_out: w("0.5"),
        }
    );
}

#[test]
fn rejects_redemption_beyond_reserve() {
    let (mut host, a) = deploy_with_deposit();
    host.approve(a.addr1, w("2000.0")).unwrap();

    let err = host.redeem(a.addr1, w("2000.0")).unwrap_err();
    assert_eq!(err.to_string(), "Contract does not have enough ETH");
    assert_eq!(host.credit_balance(&a.addr1), w("1000"));
    assert_eq!(host.reserve(), w("1"));
}

#[test]
fn rejects_when_other_redemptions_drained_reserve() {
    let (mut host, a) = deploy_with_deposit();
    host.receive(a.addr1, w("2.0")).unwrap();
    host.receive(a.addr2, w("1.5")).unwrap();

    host.approve(a.addr2, w("1500.0")).unwrap();
    host.redeem(a.addr2, w("1500.0")).unwrap();

    // addr1 holds 3000 credits against a 3 ETH reserve; 3500 is too many.
    host.approve(a.addr1, w("3500.0")).unwrap();
    let err = host.redeem(a.addr1, w("3500.0")).unwrap_err();
    assert!(matches!(err, ExchangeError::InsufficientReserve { .. }));
    assert_eq!(host.reserve(), w("3"));
}

#[test]
fn redemption_needs_allowance() {
    let (mut host, a) = deploy_with_deposit();
    let err = host.redeem(a.addr1, w("1")).unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Ledger(LedgerError::InsufficientAllowance { .. })
    ));
}

#[test]
fn transferred_credits_are_redeemable_by_recipient() {
    let (mut host, a) = deploy_with_deposit();
    host.transfer_credits(a.addr1, a.addr2, w("250")).unwrap();
    host.approve(a.addr2, w("250")).unwrap();
    let payout = host.redeem(a.addr2, w("250")).unwrap();
    assert_eq!(payout, w("0.25"));
    assert_eq!(host.reserve(), w("0.75"));
}

#[test]
fn refused_payout_changes_nothing() {
    let (mut host, a) = deploy_with_deposit();
    host.approve(a.addr1, w("1000")).unwrap();
    host.freeze(a.addr1);
    let before = host.clone();

    let err = host.redeem(a.addr1, w("1000")).unwrap_err();
    assert!(matches!(err, ExchangeError::PayoutFailed(_)));
    assert_eq!(host, before);
}

// ---------------------------------------------------------------------------
// Owner Functions
// ---------------------------------------------------------------------------

#[test]
fn owner_updates_rate() {
    let (mut host, a) = deploy();
    host.set_exchange_rate(a.owner, w("2000")).unwrap();
    assert_eq!(host.rate(), w("2000"));

    host.receive(a.addr1, w("1")).unwrap();
    assert_eq!(host.credit_balance(&a.addr1), w("2000"));
}

#[test]
fn emits_exchange_rate_updated() {
    let (mut host, a) = deploy();
    let old_rate = host.rate();
    host.set_exchange_rate(a.owner, w("2000")).unwrap();
    assert_eq!(
        host.events().last().unwrap().event,
        ExchangeEvent::ExchangeRateUpdated {
            old_rate,
            new_rate: w("2000"),
        }
    );
}

#[test]
fn non_owner_cannot_update_rate() {
    let (mut host, a) = deploy();
    let err = host.set_exchange_rate(a.addr1, w("2000")).unwrap_err();
    assert_eq!(err.to_string(), "Only owner can call this function");
    assert_eq!(host.rate(), w("1000"));
    assert!(host.events().is_empty());
}

#[test]
fn owner_emergency_withdraws() {
    let (mut host, a) = deploy();
    host.receive(a.addr1, w("1.0")).unwrap();
    let before = host.native_balance(&a.owner);

    host.emergency_withdraw(a.owner, w("0.5")).unwrap();

    assert_eq!(host.native_balance(&a.owner), before.checked_add(w("0.5")).unwrap());
    assert_eq!(host.reserve(), w("0.5"));
}

#[test]
fn non_owner_cannot_emergency_withdraw() {
    let (mut host, a) = deploy_with_deposit();
    let err = host.emergency_withdraw(a.addr1, w("0.1")).unwrap_err();
    assert_eq!(err.to_string(), "Only owner can call this function");
    assert_eq!(host.reserve(), w("1"));
}

#[test]
fn refused_withdrawal_changes_nothing() {
    let (mut host, a) = deploy_with_deposit();
    host.freeze(a.owner);
    let before = host.clone();

    let err = host.emergency_withdraw(a.owner, w("0.5")).unwrap_err();
    assert!(matches!(err, ExchangeError::PayoutFailed(_)));
    assert_eq!(err.to_string(), "ETH transfer failed");
    assert_eq!(host.reserve(), w("1"));
    assert_eq!(host, before);
}

#[test]
fn withdrawal_can_leave_credits_unbacked() {
    let (mut host, a) = deploy_with_deposit();
    host.emergency_withdraw(a.owner, w("1")).unwrap();
    assert_eq!(host.reserve(), Wad::ZERO);
    assert_eq!(host.total_credit_supply(), w("1000"));
    assert_eq!(host.backing_ratio(), Some(0.0));

    host.approve(a.addr1, w("1")).unwrap();
    assert!(matches!(
        host.redeem(a.addr1, w("1")),
        Err(ExchangeError::InsufficientReserve { .. })
    ));
}

// ---------------------------------------------------------------------------
// Observability
// ---------------------------------------------------------------------------

#[test]
fn reads_are_stable_without_mutation() {
    let (mut host, a) = deploy_with_deposit();
    host.receive(a.addr2, w("0.3")).unwrap();
    assert_eq!(host.rate(), host.rate());
    assert_eq!(host.reserve(), host.reserve());
    assert_eq!(host.state_root(), host.state_root());
}

#[test]
fn host_snapshot_round_trips_through_bincode() {
    let (mut host, a) = deploy_with_deposit();
    host.approve(a.addr1, w("10")).unwrap();
    let bytes = bincode::serialize(&host).unwrap();
    let restored: ExchangeHost = bincode::deserialize(&bytes).unwrap();
    assert_eq!(restored, host);
    assert_eq!(restored.state_root(), host.state_root());
}
