// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Exchange Engine Contract
//!
//! Converts native currency into ledger credits at a configurable rate and
//! back again at the inverse rate. The engine's reserve is not a field: it is
//! whatever native balance the world state records under the engine's own
//! address.
//!
//! ## Conversions
//!
//! ```text
//! deposit:  credits = floor(amount  * rate / 10^18)
//! redeem:   payout  = floor(credits * 10^18 / rate)
//! ```
//!
//! Both truncate toward zero. Dust below one base unit stays in the reserve.
//!
//! ## Call Ordering
//!
//! Redemption follows checks-effects-interactions:
//!
//! 1. **Checks** -- nonzero amount, payout computed, payout covered by reserve.
//! 2. **Effects** -- credits burned from the caller through their allowance.
//! 3. **Interaction** -- native payout to the caller.
//!
//! The burn is recorded before any value leaves the engine. If the recipient
//! refuses the payout, the burn is rolled back and the call fails as a whole.
//!
//! ## Authority
//!
//! The deployer is the authority for the engine's lifetime. Only it may
//! change the rate or withdraw reserve. An emergency withdrawal does not
//! consult outstanding credits and can leave them under-collateralized.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use ethx_protocol::storage::{StateError, WorldState};
use ethx_protocol::{Address, AmountError, Wad};

use crate::credit_ledger::{CreditLedger, LedgerError};
use crate::events::{EventLog, ExchangeEvent};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during exchange operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// A conversion was attempted with a zero amount.
    #[error("{reason}")]
    InvalidAmount {
        /// Human-readable rejection message.
        reason: &'static str,
    },

    /// The engine was named as the sender of its own deposit.
    #[error("Exchange cannot deposit into itself")]
    SelfDeposit,

    /// The rate is zero.
    #[error("Exchange rate must be greater than zero")]
    InvalidRate,

    /// A privileged operation was called by someone other than the authority.
    #[error("Only owner can call this function")]
    Unauthorized {
        /// Who attempted the call.
        caller: Address,
    },

    /// The reserve cannot cover the requested payout.
    #[error("Contract does not have enough ETH")]
    InsufficientReserve {
        /// Native balance held by the engine.
        reserve: Wad,
        /// Amount that would have been paid out.
        requested: Wad,
    },

    /// The caller holds fewer credits than they tried to redeem.
    #[error("insufficient credit: holds {available}, tried to redeem {requested}")]
    InsufficientCredit {
        /// Caller's credit balance.
        available: Wad,
        /// Credits requested for redemption.
        requested: Wad,
    },

    /// The ledger rejected the operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A native transfer into the engine failed.
    #[error(transparent)]
    Native(#[from] StateError),

    /// The engine could not pay out native currency.
    #[error("ETH transfer failed")]
    PayoutFailed(#[source] StateError),

    /// Conversion arithmetic left the representable range.
    #[error("conversion overflow: {0}")]
    Arithmetic(#[from] AmountError),
}

const DEPOSIT_ZERO: &str = "Must send ETH to get tokens";
const REDEEM_ZERO: &str = "Must send tokens to get ETH";

// ---------------------------------------------------------------------------
// ExchangeEngine
// ---------------------------------------------------------------------------

/// The exchange contract together with the credit ledger it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeEngine {
    /// Address of the engine; holds the reserve.
    address: Address,
    /// Sole account allowed to change the rate or withdraw reserve.
    authority: Address,
    /// Credits per unit of native currency.
    rate: Wad,
    /// The credit ledger created at deployment. The engine is its mint authority.
    ledger: CreditLedger,
    /// Conversion and rate-change events.
    events: EventLog<ExchangeEvent>,
}

impl ExchangeEngine {
    /// Deploys a new engine from `deployer`, creating its ledger.
    ///
    /// The engine address is derived from the deployer's next nonce; the
    /// ledger address from the engine's first nonce. `deployer` becomes the
    /// authority.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InvalidRate`] if `initial_rate` is zero. No
    /// nonce is consumed in that case.
    pub fn deploy(
        world: &mut WorldState,
        deployer: Address,
        initial_rate: Wad,
        token_name: impl Into<String>,
        token_symbol: impl Into<String>,
    ) -> Result<Self, ExchangeError> {
        if initial_rate.is_zero() {
            return Err(ExchangeError::InvalidRate);
        }

        let address = Address::derive_contract(&deployer, world.next_nonce(&deployer));
        let ledger_address = Address::derive_contract(&address, world.next_nonce(&address));
        let ledger = CreditLedger::new(ledger_address, token_name, token_symbol, address);

        info!(
            engine = %address,
            ledger = %ledger_address,
            authority = %deployer,
            rate = %initial_rate,
            symbol = ledger.symbol(),
            "exchange deployed"
        );

        Ok(Self {
            address,
            authority: deployer,
            rate: initial_rate,
            ledger,
            events: EventLog::new(address),
        })
    }

    // -- Conversions ----------------------------------------------------------

    /// Converts `amount` of `sender`'s native currency into credits.
    ///
    /// The currency moves into the engine's reserve and
    /// `amount * rate` credits are minted to `sender`. Returns the credits
    /// issued.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InvalidAmount`] if `amount` is zero.
    /// Returns [`ExchangeError::SelfDeposit`] if `sender` is the engine.
    /// Returns [`ExchangeError::Native`] if `sender` cannot fund the deposit.
    pub fn deposit(
        &mut self,
        world: &mut WorldState,
        sender: Address,
        amount: Wad,
    ) -> Result<Wad, ExchangeError> {
        self.try_deposit(world, sender, amount).map_err(|e| {
            debug!(%sender, %amount, error = %e, "deposit rejected");
            e
        })
    }

    fn try_deposit(
        &mut self,
        world: &mut WorldState,
        sender: Address,
        amount: Wad,
    ) -> Result<Wad, ExchangeError> {
        if amount.is_zero() {
            return Err(ExchangeError::InvalidAmount {
                reason: DEPOSIT_ZERO,
            });
        }
        // A transfer from the reserve to itself moves nothing.
        if sender == self.address {
            return Err(ExchangeError::SelfDeposit);
        }
        let credits = self.quote_deposit(amount)?;

        let checkpoint = world.checkpoint(&[sender, self.address]);
        world.transfer(&sender, &self.address, amount)?;
        if let Err(e) = self.ledger.mint(&self.address, &sender, credits) {
            world.restore(checkpoint);
            return Err(e.into());
        }

        self.events.emit(ExchangeEvent::EthToToken {
            sender,
            amount_in: amount,
            credits_out: credits,
        });
        info!(%sender, amount_in = %amount, credits_out = %credits, "deposit");
        Ok(credits)
    }

    /// Redeems `credits` of `caller`'s credits for native currency.
    ///
    /// The caller must first approve the engine for at least `credits`.
    /// Returns the native amount paid out.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InvalidAmount`] if `credits` is zero.
    /// Returns [`ExchangeError::InsufficientReserve`] if the payout exceeds the reserve.
    /// Returns [`ExchangeError::Ledger`] if the allowance is too small.
    /// Returns [`ExchangeError::InsufficientCredit`] if the caller holds too few credits.
    /// Returns [`ExchangeError::PayoutFailed`] if `caller` refuses the payout.
    pub fn redeem(
        &mut self,
        world: &mut WorldState,
        caller: Address,
        credits: Wad,
    ) -> Result<Wad, ExchangeError> {
        self.try_redeem(world, caller, credits).map_err(|e| {
            debug!(%caller, %credits, error = %e, "redemption rejected");
            e
        })
    }

    fn try_redeem(
        &mut self,
        world: &mut WorldState,
        caller: Address,
        credits: Wad,
    ) -> Result<Wad, ExchangeError> {
        if credits.is_zero() {
            return Err(ExchangeError::InvalidAmount {
                reason: REDEEM_ZERO,
            });
        }
        let payout = self.quote_redeem(credits)?;
        self.require_reserve(world, payout)?;

        let checkpoint = self.ledger.checkpoint(&caller, &self.address);
        self.ledger
            .burn_from(&self.address, &caller, credits)
            .map_err(|e| match e {
                LedgerError::InsufficientBalance {
                    available,
                    requested,
                    ..
                } => ExchangeError::InsufficientCredit {
                    available,
                    requested,
                },
                other => ExchangeError::Ledger(other),
            })?;

        if let Err(e) = world.transfer(&self.address, &caller, payout) {
            self.ledger.restore(checkpoint);
            return Err(ExchangeError::PayoutFailed(e));
        }

        self.events.emit(ExchangeEvent::TokenToEth {
            caller,
            credits_in: credits,
            amount_out: payout,
        });
        info!(%caller, credits_in = %credits, amount_out = %payout, "redemption");
        Ok(payout)
    }

    // -- Authority ------------------------------------------------------------

    /// Replaces the exchange rate. Only the authority may call this.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Unauthorized`] for any other caller.
    /// Returns [`ExchangeError::InvalidRate`] if `new_rate` is zero.
    pub fn set_exchange_rate(&mut self, caller: Address, new_rate: Wad) -> Result<(), ExchangeError> {
        if let Err(e) = self.require_authority(caller) {
            debug!(%caller, "rate update rejected");
            return Err(e);
        }
        if new_rate.is_zero() {
            debug!(%caller, "zero rate rejected");
            return Err(ExchangeError::InvalidRate);
        }

        let old_rate = self.rate;
        self.rate = new_rate;
        self.events
            .emit(ExchangeEvent::ExchangeRateUpdated { old_rate, new_rate });
        info!(%old_rate, %new_rate, "exchange rate updated");
        Ok(())
    }

    /// Sends `amount` of the reserve to the authority.
    ///
    /// Outstanding credits are not consulted.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Unauthorized`] for any caller but the authority.
    /// Returns [`ExchangeError::InsufficientReserve`] if `amount` exceeds the reserve.
    /// Returns [`ExchangeError::PayoutFailed`] if the authority refuses the transfer.
    pub fn emergency_withdraw(
        &mut self,
        world: &mut WorldState,
        caller: Address,
        amount: Wad,
    ) -> Result<(), ExchangeError> {
        self.try_emergency_withdraw(world, caller, amount)
            .map_err(|e| {
                debug!(%caller, %amount, error = %e, "emergency withdrawal rejected");
                e
            })
    }

    fn try_emergency_withdraw(
        &mut self,
        world: &mut WorldState,
        caller: Address,
        amount: Wad,
    ) -> Result<(), ExchangeError> {
        self.require_authority(caller)?;
        self.require_reserve(world, amount)?;
        world
            .transfer(&self.address, &self.authority, amount)
            .map_err(ExchangeError::PayoutFailed)?;

        warn!(
            %amount,
            reserve = %self.reserve(world),
            outstanding_credits = %self.ledger.total_supply(),
            "emergency withdrawal"
        );
        Ok(())
    }

    // -- Reads ----------------------------------------------------------------

    /// Address of the engine.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The authority.
    pub fn authority(&self) -> Address {
        self.authority
    }

    /// Current exchange rate.
    pub fn rate(&self) -> Wad {
        self.rate
    }

    /// The credit ledger.
    pub fn ledger(&self) -> &CreditLedger {
        &self.ledger
    }

    /// Mutable access for holder operations (approve, transfer).
    pub fn ledger_mut(&mut self) -> &mut CreditLedger {
        &mut self.ledger
    }

    /// Address of the credit ledger.
    pub fn ledger_address(&self) -> Address {
        self.ledger.address()
    }

    /// Native currency held by the engine.
    pub fn reserve(&self, world: &WorldState) -> Wad {
        world.balance_of(&self.address)
    }

    /// Conversion and rate-change events.
    pub fn events(&self) -> &EventLog<ExchangeEvent> {
        &self.events
    }

    /// Credits a deposit of `amount` would mint at the current rate.
    pub fn quote_deposit(&self, amount: Wad) -> Result<Wad, ExchangeError> {
        Ok(amount.mul_wad(self.rate)?)
    }

    /// Native payout for redeeming `credits` at the current rate.
    pub fn quote_redeem(&self, credits: Wad) -> Result<Wad, ExchangeError> {
        Ok(credits.div_wad(self.rate)?)
    }

    // -- Internals ------------------------------------------------------------

    fn require_authority(&self, caller: Address) -> Result<(), ExchangeError> {
        if caller != self.authority {
            return Err(ExchangeError::Unauthorized { caller });
        }
        Ok(())
    }

    fn require_reserve(&self, world: &WorldState, requested: Wad) -> Result<(), ExchangeError> {
        let reserve = self.reserve(world);
        if requested > reserve {
            return Err(ExchangeError::InsufficientReserve { reserve, requested });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(s: &str) -> Wad {
        Wad::parse(s).unwrap()
    }

    struct Fixture {
        world: WorldState,
        engine: ExchangeEngine,
        owner: Address,
        alice: Address,
    }

    fn fixture() -> Fixture {
        let owner = Address::from_label("owner");
        let alice = Address::from_label("alice");
        let mut world = WorldState::new();
        world.credit(&owner, w("100")).unwrap();
        world.credit(&alice, w("100")).unwrap();
        let engine =
            ExchangeEngine::deploy(&mut world, owner, w("1000"), "Testing Token", "lz404").unwrap();
        Fixture {
            world,
            engine,
            owner,
            alice,
        }
    }

    #[test]
    fn deploy_wires_ledger_to_engine() {
        let f = fixture();
        assert_eq!(f.engine.authority(), f.owner);
        assert_eq!(f.engine.rate(), w("1000"));
        assert_eq!(f.engine.ledger().mint_authority(), f.engine.address());
        assert_eq!(
            f.engine.address(),
            Address::derive_contract(&f.owner, 0)
        );
        assert_eq!(
            f.engine.ledger_address(),
            Address::derive_contract(&f.engine.address(), 0)
        );
        assert_eq!(f.engine.reserve(&f.world), Wad::ZERO);
    }

    #[test]
    fn deploy_with_zero_rate_fails_without_consuming_nonce() {
        let mut world = WorldState::new();
        let owner = Address::from_label("owner");
        let err = ExchangeEngine::deploy(&mut world, owner, Wad::ZERO, "T", "T").unwrap_err();
        assert_eq!(err, ExchangeError::InvalidRate);
        assert_eq!(world.nonce_of(&owner), 0);
    }

    #[test]
    fn deposit_mints_at_rate() {
        let mut f = fixture();
        let credits = f.engine.deposit(&mut f.world, f.alice, w("1")).unwrap();
        assert_eq!(credits, w("1000"));
        assert_eq!(f.engine.ledger().balance_of(&f.alice), w("1000"));
        assert_eq!(f.engine.reserve(&f.world), w("1"));
        assert_eq!(f.world.balance_of(&f.alice), w("99"));
    }

    #[test]
    fn zero_deposit_rejected_with_message() {
        let mut f = fixture();
        let err = f.engine.deposit(&mut f.world, f.alice, Wad::ZERO).unwrap_err();
        assert_eq!(err.to_string(), "Must send ETH to get tokens");
        assert!(f.engine.events().is_empty());
    }

    #[test]
    fn deposit_beyond_funds_changes_nothing() {
        let mut f = fixture();
        let err = f.engine.deposit(&mut f.world, f.alice, w("101")).unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Native(StateError::InsufficientFunds { .. })
        ));
        assert_eq!(f.engine.ledger().total_supply(), Wad::ZERO);
        assert_eq!(f.world.balance_of(&f.alice), w("100"));
    }

    #[test]
    fn engine_cannot_deposit_its_own_reserve() {
        let mut f = fixture();
        f.engine.deposit(&mut f.world, f.alice, w("1")).unwrap();
        let engine_addr = f.engine.address();
        let events_before = f.engine.events().len();

        let err = f.engine.deposit(&mut f.world, engine_addr, w("1")).unwrap_err();
        assert_eq!(err, ExchangeError::SelfDeposit);
        assert_eq!(f.engine.ledger().balance_of(&engine_addr), Wad::ZERO);
        assert_eq!(f.engine.ledger().total_supply(), w("1000"));
        assert_eq!(f.engine.reserve(&f.world), w("1"));
        assert_eq!(f.engine.events().len(), events_before);
    }

    #[test]
    fn redeem_pays_inverse_rate() {
        let mut f = fixture();
        f.engine.deposit(&mut f.world, f.alice, w("1")).unwrap();
        let engine_addr = f.engine.address();
        f.engine
            .ledger_mut()
            .approve(&f.alice, &engine_addr, w("500"))
            .unwrap();

        let payout = f.engine.redeem(&mut f.world, f.alice, w("500")).unwrap();
        assert_eq!(payout, w("0.5"));
        assert_eq!(f.engine.ledger().balance_of(&f.alice), w("500"));
        assert_eq!(f.engine.reserve(&f.world), w("0.5"));
        assert_eq!(f.world.balance_of(&f.alice), w("99.5"));
        assert_eq!(
            f.engine.events().last().unwrap().event,
            ExchangeEvent::TokenToEth {
                caller: f.alice,
                credits_in: w("500"),
                amount_out: w("0.5"),
            }
        );
    }

    #[test]
    fn redeem_without_allowance_rejected() {
        let mut f = fixture();
        f.engine.deposit(&mut f.world, f.alice, w("1")).unwrap();
        let err = f.engine.redeem(&mut f.world, f.alice, w("10")).unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Ledger(LedgerError::InsufficientAllowance { .. })
        ));
        assert_eq!(f.engine.reserve(&f.world), w("1"));
    }

    #[test]
    fn redeem_beyond_balance_is_insufficient_credit() {
        let mut f = fixture();
        f.engine.deposit(&mut f.world, f.alice, w("2")).unwrap();
        let bob = Address::from_label("bob");
        let engine_addr = f.engine.address();
        f.engine
            .ledger_mut()
            .transfer(&f.alice, &bob, w("1500"))
            .unwrap();
        f.engine
            .ledger_mut()
            .approve(&f.alice, &engine_addr, w("1000"))
            .unwrap();

        let err = f.engine.redeem(&mut f.world, f.alice, w("1000")).unwrap_err();
        assert_eq!(
            err,
            ExchangeError::InsufficientCredit {
                available: w("500"),
                requested: w("1000"),
            }
        );
    }

    #[test]
    fn redeem_beyond_reserve_rejected() {
        let mut f = fixture();
        f.engine.deposit(&mut f.world, f.alice, w("1")).unwrap();
        let engine_addr = f.engine.address();
        f.engine
            .ledger_mut()
            .approve(&f.alice, &engine_addr, w("2000"))
            .unwrap();

        let err = f.engine.redeem(&mut f.world, f.alice, w("2000")).unwrap_err();
        assert_eq!(err.to_string(), "Contract does not have enough ETH");
        assert_eq!(f.engine.ledger().balance_of(&f.alice), w("1000"));
        assert_eq!(f.engine.reserve(&f.world), w("1"));
    }

    #[test]
    fn refused_payout_reverts_burn() {
        let mut f = fixture();
        f.engine.deposit(&mut f.world, f.alice, w("1")).unwrap();
        let engine_addr = f.engine.address();
        f.engine
            .ledger_mut()
            .approve(&f.alice, &engine_addr, w("1000"))
            .unwrap();
        f.world.freeze(&f.alice);
        let ledger_before = f.engine.ledger().clone();
        let events_before = f.engine.events().len();

        let err = f.engine.redeem(&mut f.world, f.alice, w("1000")).unwrap_err();
        assert!(matches!(err, ExchangeError::PayoutFailed(_)));
        assert_eq!(err.to_string(), "ETH transfer failed");
        assert_eq!(f.engine.ledger(), &ledger_before);
        assert_eq!(f.engine.events().len(), events_before);
        assert_eq!(f.engine.reserve(&f.world), w("1"));
    }

    #[test]
    fn only_authority_sets_rate() {
        let mut f = fixture();
        let err = f.engine.set_exchange_rate(f.alice, w("2000")).unwrap_err();
        assert_eq!(err.to_string(), "Only owner can call this function");
        assert_eq!(f.engine.rate(), w("1000"));

        f.engine.set_exchange_rate(f.owner, w("2000")).unwrap();
        assert_eq!(f.engine.rate(), w("2000"));
        assert_eq!(
            f.engine.events().last().unwrap().event,
            ExchangeEvent::ExchangeRateUpdated {
                old_rate: w("1000"),
                new_rate: w("2000"),
            }
        );
    }

    #[test]
    fn zero_rate_update_rejected() {
        let mut f = fixture();
        assert_eq!(
            f.engine.set_exchange_rate(f.owner, Wad::ZERO),
            Err(ExchangeError::InvalidRate)
        );
    }

    #[test]
    fn emergency_withdraw_pays_authority() {
        let mut f = fixture();
        f.engine.deposit(&mut f.world, f.alice, w("1")).unwrap();
        f.engine
            .emergency_withdraw(&mut f.world, f.owner, w("0.5"))
            .unwrap();
        assert_eq!(f.engine.reserve(&f.world), w("0.5"));
        assert_eq!(f.world.balance_of(&f.owner), w("100.5"));
        // Credits stay outstanding.
        assert_eq!(f.engine.ledger().total_supply(), w("1000"));
    }

    #[test]
    fn emergency_withdraw_guards() {
        let mut f = fixture();
        f.engine.deposit(&mut f.world, f.alice, w("1")).unwrap();
        assert!(matches!(
            f.engine.emergency_withdraw(&mut f.world, f.alice, w("0.1")),
            Err(ExchangeError::Unauthorized { .. })
        ));
        assert!(matches!(
            f.engine.emergency_withdraw(&mut f.world, f.owner, w("2")),
            Err(ExchangeError::InsufficientReserve { .. })
        ));
        assert_eq!(f.engine.reserve(&f.world), w("1"));
    }

    #[test]
    fn refused_withdrawal_changes_nothing() {
        let mut f = fixture();
        f.engine.deposit(&mut f.world, f.alice, w("1")).unwrap();
        f.world.freeze(&f.owner);
        let world_before = f.world.clone();

        let err = f
            .engine
            .emergency_withdraw(&mut f.world, f.owner, w("0.5"))
            .unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::PayoutFailed(StateError::RecipientRejected(addr)) if addr == f.owner
        ));
        assert_eq!(f.world, world_before);
    }

    #[test]
    fn quotes_truncate_toward_zero() {
        let f = fixture();
        assert_eq!(f.engine.quote_deposit(w("0.0015")).unwrap(), w("1.5"));
        assert_eq!(
            f.engine.quote_redeem(Wad::from_base_units(999)).unwrap(),
            Wad::ZERO
        );
    }
}
