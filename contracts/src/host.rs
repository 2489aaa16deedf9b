// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Exchange Host
//!
//! Pairs a deployed [`ExchangeEngine`] with the [`WorldState`] its reserve
//! lives in. The host is what a node locks, mutates, and persists as one
//! unit; every boundary operation takes `&mut self`, so calls are
//! serialized and none can observe another half-done.

use serde::{Deserialize, Serialize};

use ethx_protocol::config::{DeploymentConfig, GenesisAccount};
use ethx_protocol::storage::WorldState;
use ethx_protocol::{Address, Wad};

use crate::credit_ledger::CreditLedger;
use crate::events::{EventLog, ExchangeEvent};
use crate::exchange_engine::{ExchangeEngine, ExchangeError};

/// A deployed exchange and the world it runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeHost {
    world: WorldState,
    engine: ExchangeEngine,
}

impl ExchangeHost {
    /// Funds the genesis accounts, then deploys the exchange as described by
    /// `config`.
    pub fn deploy(
        config: &DeploymentConfig,
        genesis: &[GenesisAccount],
    ) -> Result<Self, ExchangeError> {
        let mut world = WorldState::new();
        for account in genesis {
            world.credit(&account.address, account.balance)?;
        }
        let engine = ExchangeEngine::deploy(
            &mut world,
            config.deployer,
            config.initial_rate,
            config.token_name.clone(),
            config.token_symbol.clone(),
        )?;
        Ok(Self { world, engine })
    }

    /// Reassembles a host from a persisted world and engine.
    pub fn from_parts(world: WorldState, engine: ExchangeEngine) -> Self {
        Self { world, engine }
    }

    // -- Boundary operations --------------------------------------------------

    /// A plain value transfer to the engine. Converts it into credits.
    pub fn receive(&mut self, sender: Address, value: Wad) -> Result<Wad, ExchangeError> {
        self.engine.deposit(&mut self.world, sender, value)
    }

    /// Lets the engine debit up to `amount` of `owner`'s credits.
    pub fn approve(&mut self, owner: Address, amount: Wad) -> Result<(), ExchangeError> {
        let spender = self.engine.address();
        self.engine.ledger_mut().approve(&owner, &spender, amount)?;
        Ok(())
    }

    /// Moves credits between holders.
    pub fn transfer_credits(
        &mut self,
        from: Address,
        to: Address,
        amount: Wad,
    ) -> Result<(), ExchangeError> {
        self.engine.ledger_mut().transfer(&from, &to, amount)?;
        Ok(())
    }

    /// Redeems credits for native currency.
    pub fn redeem(&mut self, caller: Address, credits: Wad) -> Result<Wad, ExchangeError> {
        self.engine.redeem(&mut self.world, caller, credits)
    }

    /// Authority-only rate change.
    pub fn set_exchange_rate(&mut self, caller: Address, new_rate: Wad) -> Result<(), ExchangeError> {
        self.engine.set_exchange_rate(caller, new_rate)
    }

    /// Authority-only reserve withdrawal.
    pub fn emergency_withdraw(&mut self, caller: Address, amount: Wad) -> Result<(), ExchangeError> {
        self.engine.emergency_withdraw(&mut self.world, caller, amount)
    }

    /// Freezes `address` so it refuses incoming value, standing in for an
    /// account whose receive hook reverts.
    pub fn freeze(&mut self, address: Address) {
        self.world.freeze(&address);
    }

    /// Unfreezes `address`.
    pub fn unfreeze(&mut self, address: Address) {
        self.world.unfreeze(&address);
    }

    // -- Reads ----------------------------------------------------------------

    /// The deployed engine.
    pub fn engine(&self) -> &ExchangeEngine {
        &self.engine
    }

    /// Native-currency accounts, including the engine's reserve.
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// The engine's credit ledger.
    pub fn ledger(&self) -> &CreditLedger {
        self.engine.ledger()
    }

    /// Exchange events in emission order.
    pub fn events(&self) -> &EventLog<ExchangeEvent> {
        self.engine.events()
    }

    /// Current exchange rate.
    pub fn rate(&self) -> Wad {
        self.engine.rate()
    }

    /// Native currency held by the engine.
    pub fn reserve(&self) -> Wad {
        self.engine.reserve(&self.world)
    }

    /// Native balance of `account`.
    pub fn native_balance(&self, account: &Address) -> Wad {
        self.world.balance_of(account)
    }

    /// Credit balance of `account`.
    pub fn credit_balance(&self, account: &Address) -> Wad {
        self.engine.ledger().balance_of(account)
    }

    /// Credits `spender` may move on behalf of `owner`.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Wad {
        self.engine.ledger().allowance(owner, spender)
    }

    /// Credits outstanding across all holders.
    pub fn total_credit_supply(&self) -> Wad {
        self.engine.ledger().total_supply()
    }

    /// Reserve divided by the native value of all outstanding credits at the
    /// current rate. `None` while no credits exist.
    ///
    /// Below `1.0` the reserve cannot redeem every credit; only an
    /// emergency withdrawal gets it there.
    pub fn backing_ratio(&self) -> Option<f64> {
        let outstanding = self.total_credit_supply();
        if outstanding.is_zero() {
            return None;
        }
        let liability = self.engine.quote_redeem(outstanding).ok()?;
        if liability.is_zero() {
            return None;
        }
        Some(self.reserve().to_f64_lossy() / liability.to_f64_lossy())
    }

    /// Commitment to native accounts, the rate, and every credit balance.
    ///
    /// ```text
    /// root = BLAKE3(world_root || engine || rate || supply || sorted(holder || balance)*)
    /// ```
    pub fn state_root(&self) -> [u8; 32] {
        let ledger = self.engine.ledger();
        let mut holders: Vec<(&Address, &Wad)> = ledger.balances().collect();
        holders.sort_unstable_by_key(|(addr, _)| **addr);

        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.world.root_hash());
        hasher.update(self.engine.address().as_bytes());
        hasher.update(&self.engine.rate().base_units().to_be_bytes());
        hasher.update(&ledger.total_supply().base_units().to_be_bytes());
        for (addr, balance) in holders {
            hasher.update(addr.as_bytes());
            hasher.update(&balance.base_units().to_be_bytes());
        }
        *hasher.finalize().as_bytes()
    }
}
